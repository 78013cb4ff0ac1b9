use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use super::{
    ChangeEvent, GroupPatch, GroupRecord, NewGroup, NewPlace, PlacePatch, PlaceRecord,
    RemoteStore, StoreError, Subscription,
};

/// 内存实现，供测试与 STORE_MODE=memory 的本地运行使用。
/// 每个群组一条 broadcast 通道，成功写入后立刻广播对应事件
pub struct MemoryStore {
    inner: RwLock<Inner>,
    channel_capacity: usize,
}

#[derive(Default)]
struct Inner {
    groups: HashMap<String, GroupRecord>,
    // Vec 保持插入顺序，即 fetch_places 的"服务端返回顺序"
    places: Vec<PlaceRecord>,
    channels: HashMap<String, broadcast::Sender<ChangeEvent>>,
}

impl MemoryStore {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            channel_capacity,
        }
    }

    fn sender(&self, inner: &mut Inner, group_id: &str) -> broadcast::Sender<ChangeEvent> {
        inner
            .channels
            .entry(group_id.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn create_group(&self, group: NewGroup) -> Result<GroupRecord, StoreError> {
        let record = GroupRecord {
            id: Uuid::new_v4().to_string(),
            name: group.name,
            members: group.members,
            share_token: group.share_token,
            created_at: Utc::now(),
        };
        let mut inner = self.inner.write().await;
        inner.groups.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn fetch_group(&self, group_id: &str) -> Result<Option<GroupRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.groups.get(group_id).cloned())
    }

    async fn update_group(
        &self,
        group_id: &str,
        patch: GroupPatch,
    ) -> Result<GroupRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner.groups.get_mut(group_id).ok_or(StoreError::NotFound)?;
        if let Some(name) = patch.name {
            record.name = name;
        }
        if let Some(members) = patch.members {
            record.members = members;
        }
        Ok(record.clone())
    }

    async fn fetch_places(&self, group_id: &str) -> Result<Vec<PlaceRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .places
            .iter()
            .filter(|p| p.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn insert_place(&self, place: NewPlace) -> Result<PlaceRecord, StoreError> {
        let record = PlaceRecord {
            id: Uuid::new_v4().to_string(),
            group_id: place.group_id,
            title: place.title,
            note: place.note,
            link: place.link,
            visited: place.visited,
            favorite: place.favorite,
            member: place.member,
            created_at: Utc::now(),
        };
        let mut inner = self.inner.write().await;
        inner.places.push(record.clone());
        let sender = self.sender(&mut inner, &record.group_id);
        let _ = sender.send(ChangeEvent::Inserted(record.clone()));
        Ok(record)
    }

    async fn update_place(
        &self,
        place_id: &str,
        patch: PlacePatch,
    ) -> Result<PlaceRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .places
            .iter_mut()
            .find(|p| p.id == place_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(title) = patch.title {
            record.title = title;
        }
        if let Some(note) = patch.note {
            record.note = note;
        }
        if let Some(link) = patch.link {
            record.link = link;
        }
        if let Some(visited) = patch.visited {
            record.visited = visited;
        }
        if let Some(favorite) = patch.favorite {
            record.favorite = favorite;
        }
        if let Some(member) = patch.member {
            record.member = member;
        }
        let record = record.clone();
        let sender = self.sender(&mut inner, &record.group_id);
        let _ = sender.send(ChangeEvent::Updated(record.clone()));
        Ok(record)
    }

    async fn delete_place(&self, place_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let Some(pos) = inner.places.iter().position(|p| p.id == place_id) else {
            return Err(StoreError::NotFound);
        };
        let record = inner.places.remove(pos);
        let sender = self.sender(&mut inner, &record.group_id);
        let _ = sender.send(ChangeEvent::Deleted { id: record.id });
        Ok(())
    }

    async fn subscribe(&self, group_id: &str) -> Result<Subscription, StoreError> {
        let mut rx = {
            let mut inner = self.inner.write().await;
            self.sender(&mut inner, group_id).subscribe()
        };
        let (tx, out) = mpsc::channel(self.channel_capacity);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Change feed lagged, dropped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(Subscription::new(out, task))
    }
}
