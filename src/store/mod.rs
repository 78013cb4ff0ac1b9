mod http;
mod memory;
mod records;

pub use http::HttpStore;
pub use memory::MemoryStore;
pub use records::{
    ChangeEvent, GroupPatch, GroupRecord, NewGroup, NewPlace, PlacePatch, PlaceRecord,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 远程存储调用失败的分类，所有调用方只记录日志、不重试
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("malformed store response: {0}")]
    Malformed(String),

    #[error("change feed closed")]
    Closed,
}

/// 托管存储的黑盒边界：两张逻辑表（groups / places）的增删改查，
/// 外加一个按群组过滤的实时变更订阅通道
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create_group(&self, group: NewGroup) -> Result<GroupRecord, StoreError>;

    async fn fetch_group(&self, group_id: &str) -> Result<Option<GroupRecord>, StoreError>;

    async fn update_group(&self, group_id: &str, patch: GroupPatch)
    -> Result<GroupRecord, StoreError>;

    /// 返回顺序即服务端返回顺序，本地不再排序
    async fn fetch_places(&self, group_id: &str) -> Result<Vec<PlaceRecord>, StoreError>;

    async fn insert_place(&self, place: NewPlace) -> Result<PlaceRecord, StoreError>;

    async fn update_place(&self, place_id: &str, patch: PlacePatch)
    -> Result<PlaceRecord, StoreError>;

    async fn delete_place(&self, place_id: &str) -> Result<(), StoreError>;

    /// 订阅某个群组的 places 变更事件，丢弃返回值即取消订阅
    async fn subscribe(&self, group_id: &str) -> Result<Subscription, StoreError>;
}

/// 实时订阅句柄。事件经由内部通道送达；Drop 时终止抽水任务，
/// 保证视图关闭后不再持有远端资源
pub struct Subscription {
    rx: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::Receiver<ChangeEvent>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// 等待下一个变更事件，通道关闭时返回 None
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
