use serde::Deserialize;

use crate::store::{ChangeEvent, PlaceRecord};

/// 一个打开的列表视图的全部本地状态。
/// 不变量：每个地点恰好落在 to_visit / visited 两个序列之一，
/// 收藏视图是跨两个序列的派生过滤，不单独存储。
/// 所有变更都经过本文件的几个入口，分区逻辑只写在这一处
#[derive(Debug, Clone, Default)]
pub struct ListState {
    pub group_name: String,
    pub members: Vec<String>,
    pub to_visit: Vec<PlaceRecord>,
    pub visited: Vec<PlaceRecord>,
    /// 正在等待"已去过"确认的地点，远程调用失败时必须复位
    pub pending_visit: Option<String>,
}

/// 三个对外视图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    ToVisit,
    Visited,
    Favorites,
}

impl ListState {
    pub fn new(group_name: String, members: Vec<String>) -> Self {
        Self {
            group_name,
            members,
            ..Default::default()
        }
    }

    /// 整批重建两个序列，顺序沿用传入顺序（即服务端返回顺序）
    pub fn set_places(&mut self, places: Vec<PlaceRecord>) {
        self.to_visit.clear();
        self.visited.clear();
        self.pending_visit = None;
        for place in places {
            if place.visited {
                self.visited.push(place);
            } else {
                self.to_visit.push(place);
            }
        }
    }

    /// 实时事件的唯一入口。对重复和乱序送达保持幂等
    pub fn apply(&mut self, event: ChangeEvent) {
        match event {
            // 插入按 visited 标志分区；同 id 已存在时退化为替换
            ChangeEvent::Inserted(place) | ChangeEvent::Updated(place) => self.upsert(place),
            ChangeEvent::Deleted { id } => self.remove(&id),
        }
    }

    /// 替换或插入一行：目标序列由行自身的 visited 标志决定，
    /// 已在目标序列中则原地替换（保持位置），否则从另一序列摘除后追加
    pub fn upsert(&mut self, place: PlaceRecord) {
        let (target, other) = if place.visited {
            (&mut self.visited, &mut self.to_visit)
        } else {
            (&mut self.to_visit, &mut self.visited)
        };
        other.retain(|p| p.id != place.id);
        match target.iter_mut().find(|p| p.id == place.id) {
            Some(slot) => *slot = place,
            None => target.push(place),
        }
    }

    /// 两个序列都按 id 摘除；不存在时是空操作
    pub fn remove(&mut self, place_id: &str) {
        self.to_visit.retain(|p| p.id != place_id);
        self.visited.retain(|p| p.id != place_id);
        if self.pending_visit.as_deref() == Some(place_id) {
            self.pending_visit = None;
        }
    }

    pub fn find(&self, place_id: &str) -> Option<&PlaceRecord> {
        self.to_visit
            .iter()
            .chain(self.visited.iter())
            .find(|p| p.id == place_id)
    }

    pub fn view(&self, kind: ViewKind) -> Vec<PlaceRecord> {
        match kind {
            ViewKind::ToVisit => self.to_visit.clone(),
            ViewKind::Visited => self.visited.clone(),
            ViewKind::Favorites => self
                .to_visit
                .iter()
                .chain(self.visited.iter())
                .filter(|p| p.favorite)
                .cloned()
                .collect(),
        }
    }
}
