mod session;
mod state;

pub use session::{ListSession, PlaceFields, SyncManager};
pub use state::{ListState, ViewKind};

use thiserror::Error;

use crate::store::StoreError;

/// 同步层的错误分类，handler 据此映射响应码
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("group not found")]
    GroupNotFound,

    #[error("place not found")]
    PlaceNotFound,

    #[error("list for group {0} is not open")]
    NotOpen(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
