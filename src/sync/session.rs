use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::store::{GroupPatch, NewPlace, PlacePatch, PlaceRecord, RemoteStore};

use super::{ListState, SyncError};

/// 新增地点的输入，字段含义与编辑对话框一致
#[derive(Debug, Clone)]
pub struct PlaceFields {
    pub title: String,
    pub note: String,
    pub link: String,
    pub member: String,
}

/// 一个群组列表的活动同步会话：打开时整批拉取并订阅增量，
/// 用户操作先写远端、成功后乐观拼接本地状态，
/// 收敛交给实时事件（apply 幂等，重复回声无害）
pub struct ListSession {
    group_id: String,
    store: Arc<dyn RemoteStore>,
    state: Arc<RwLock<ListState>>,
    feed: JoinHandle<()>,
}

impl ListSession {
    /// 打开会话：群组不存在时记日志并中止；places 整批拉取后按
    /// visited 标志分区；随后挂上实时订阅
    pub async fn open(store: Arc<dyn RemoteStore>, group_id: &str) -> Result<Self, SyncError> {
        let group = match store.fetch_group(group_id).await {
            Ok(Some(group)) => group,
            Ok(None) => {
                tracing::error!("Group {} not found, aborting list open", group_id);
                return Err(SyncError::GroupNotFound);
            }
            Err(e) => {
                tracing::error!("Error fetching group {}: {}", group_id, e);
                return Err(e.into());
            }
        };

        let places = store.fetch_places(group_id).await.map_err(|e| {
            tracing::error!("Error fetching places for group {}: {}", group_id, e);
            e
        })?;

        let mut state = ListState::new(group.name, group.members);
        state.set_places(places);
        let state = Arc::new(RwLock::new(state));

        let mut subscription = store.subscribe(group_id).await?;
        let feed_state = state.clone();
        let feed = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                feed_state.write().await.apply(event);
            }
        });

        Ok(Self {
            group_id: group_id.to_string(),
            store,
            state,
            feed,
        })
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub async fn snapshot(&self) -> ListState {
        self.state.read().await.clone()
    }

    /// 整批重拉并重新分区，作为显式操作暴露，平时靠订阅收敛即可
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let places = self.store.fetch_places(&self.group_id).await.map_err(|e| {
            tracing::error!("Error refreshing places for group {}: {}", self.group_id, e);
            e
        })?;
        self.state.write().await.set_places(places);
        Ok(())
    }

    pub async fn add_place(&self, fields: PlaceFields) -> Result<PlaceRecord, SyncError> {
        if fields.title.trim().is_empty() || fields.member.trim().is_empty() {
            return Err(SyncError::Validation(
                "Title and member are required".to_string(),
            ));
        }

        let record = self
            .store
            .insert_place(NewPlace {
                group_id: self.group_id.clone(),
                title: fields.title,
                note: fields.note,
                link: fields.link,
                visited: false,
                favorite: false,
                member: fields.member,
            })
            .await
            .map_err(|e| {
                tracing::error!("Error adding place: {}", e);
                e
            })?;

        self.state.write().await.upsert(record.clone());
        Ok(record)
    }

    /// 翻转 visited 标志，行随之移到另一序列。
    /// pending_visit 在远程调用前置位，失败时必须复位
    pub async fn toggle_visited(&self, place_id: &str) -> Result<PlaceRecord, SyncError> {
        let currently_visited = {
            let mut state = self.state.write().await;
            let Some(place) = state.find(place_id) else {
                return Err(SyncError::PlaceNotFound);
            };
            let visited = place.visited;
            state.pending_visit = Some(place_id.to_string());
            visited
        };

        let patch = PlacePatch {
            visited: Some(!currently_visited),
            ..Default::default()
        };
        match self.store.update_place(place_id, patch).await {
            Ok(updated) => {
                let mut state = self.state.write().await;
                state.upsert(updated.clone());
                state.pending_visit = None;
                Ok(updated)
            }
            Err(e) => {
                tracing::error!("Error updating visited status for {}: {}", place_id, e);
                self.state.write().await.pending_visit = None;
                Err(e.into())
            }
        }
    }

    /// 翻转收藏标志，行留在原序列
    pub async fn toggle_favorite(&self, place_id: &str) -> Result<PlaceRecord, SyncError> {
        let currently_favorite = {
            let state = self.state.read().await;
            let Some(place) = state.find(place_id) else {
                return Err(SyncError::PlaceNotFound);
            };
            place.favorite
        };

        let patch = PlacePatch {
            favorite: Some(!currently_favorite),
            ..Default::default()
        };
        let updated = self.store.update_place(place_id, patch).await.map_err(|e| {
            tracing::error!("Error updating favorite status for {}: {}", place_id, e);
            e
        })?;

        self.state.write().await.upsert(updated.clone());
        Ok(updated)
    }

    /// 全字段编辑，visited / favorite 不经此路径改动
    pub async fn edit_place(
        &self,
        place_id: &str,
        fields: PlaceFields,
    ) -> Result<PlaceRecord, SyncError> {
        if self.state.read().await.find(place_id).is_none() {
            return Err(SyncError::PlaceNotFound);
        }

        let patch = PlacePatch {
            title: Some(fields.title),
            note: Some(fields.note),
            link: Some(fields.link),
            member: Some(fields.member),
            ..Default::default()
        };
        let updated = self.store.update_place(place_id, patch).await.map_err(|e| {
            tracing::error!("Error updating place {}: {}", place_id, e);
            e
        })?;

        self.state.write().await.upsert(updated.clone());
        Ok(updated)
    }

    pub async fn delete_place(&self, place_id: &str) -> Result<(), SyncError> {
        self.store.delete_place(place_id).await.map_err(|e| {
            tracing::error!("Error deleting place {}: {}", place_id, e);
            e
        })?;
        self.state.write().await.remove(place_id);
        Ok(())
    }

    pub async fn rename_group(&self, name: &str) -> Result<(), SyncError> {
        if name.trim().is_empty() {
            return Err(SyncError::Validation("Group name is required".to_string()));
        }

        let patch = GroupPatch {
            name: Some(name.to_string()),
            ..Default::default()
        };
        let updated = self
            .store
            .update_group(&self.group_id, patch)
            .await
            .map_err(|e| {
                tracing::error!("Error renaming group {}: {}", self.group_id, e);
                e
            })?;

        self.state.write().await.group_name = updated.name;
        Ok(())
    }

    /// 成员的增删改都收敛为整份名单回写，删除同样落库
    pub async fn set_members(&self, members: Vec<String>) -> Result<(), SyncError> {
        if members.iter().any(|m| m.trim().is_empty()) {
            return Err(SyncError::Validation("Member name is required".to_string()));
        }

        let patch = GroupPatch {
            members: Some(members),
            ..Default::default()
        };
        let updated = self
            .store
            .update_group(&self.group_id, patch)
            .await
            .map_err(|e| {
                tracing::error!("Error updating members of group {}: {}", self.group_id, e);
                e
            })?;

        self.state.write().await.members = updated.members;
        Ok(())
    }
}

impl Drop for ListSession {
    fn drop(&mut self) {
        // 关闭视图即停止监听，错过的事件不补；重开会话会整批重拉
        self.feed.abort();
    }
}

/// 打开中的会话注册表，一个群组至多一个会话
pub struct SyncManager {
    store: Arc<dyn RemoteStore>,
    sessions: Mutex<HashMap<String, Arc<ListSession>>>,
}

impl SyncManager {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// 重复打开同一群组返回现有会话
    pub async fn open(&self, group_id: &str) -> Result<Arc<ListSession>, SyncError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(group_id) {
            return Ok(session.clone());
        }
        let session = Arc::new(ListSession::open(self.store.clone(), group_id).await?);
        sessions.insert(group_id.to_string(), session.clone());
        Ok(session)
    }

    pub async fn close(&self, group_id: &str) -> bool {
        self.sessions.lock().await.remove(group_id).is_some()
    }

    pub async fn session(&self, group_id: &str) -> Result<Arc<ListSession>, SyncError> {
        self.sessions
            .lock()
            .await
            .get(group_id)
            .cloned()
            .ok_or_else(|| SyncError::NotOpen(group_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::store::{GroupRecord, MemoryStore, NewGroup, StoreError, Subscription};
    use crate::sync::ViewKind;

    use super::*;

    async fn store_with_group(members: &[&str]) -> (Arc<MemoryStore>, GroupRecord) {
        let store = Arc::new(MemoryStore::new(16));
        let group = store
            .create_group(NewGroup {
                name: "Trip".to_string(),
                members: members.iter().map(|m| m.to_string()).collect(),
                share_token: Uuid::new_v4().to_string(),
            })
            .await
            .unwrap();
        (store, group)
    }

    fn fields(title: &str, member: &str) -> PlaceFields {
        PlaceFields {
            title: title.to_string(),
            note: String::new(),
            link: String::new(),
            member: member.to_string(),
        }
    }

    /// 轮询会话状态直到断言成立或超时，吸收订阅任务的调度延迟
    async fn wait_until<F>(session: &ListSession, check: F)
    where
        F: Fn(&ListState) -> bool,
    {
        for _ in 0..100 {
            if check(&session.snapshot().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached: {:?}", session.snapshot().await);
    }

    #[tokio::test]
    async fn open_fails_for_unknown_group() {
        let store = Arc::new(MemoryStore::new(16));
        // ListSession 持有 dyn store，没有 Debug 实现，取 err 再断言
        let err = ListSession::open(store, "missing").await.err().unwrap();
        assert!(matches!(err, SyncError::GroupNotFound));
    }

    #[tokio::test]
    async fn open_partitions_existing_places() {
        let (store, group) = store_with_group(&["A"]).await;
        let session = ListSession::open(store.clone(), &group.id).await.unwrap();
        session.add_place(fields("Tower", "A")).await.unwrap();
        let visited = session.add_place(fields("Museum", "A")).await.unwrap();
        session.toggle_visited(&visited.id).await.unwrap();
        drop(session);

        let reopened = ListSession::open(store, &group.id).await.unwrap();
        let state = reopened.snapshot().await;
        assert_eq!(state.group_name, "Trip");
        assert_eq!(state.to_visit.len(), 1);
        assert_eq!(state.visited.len(), 1);
    }

    #[tokio::test]
    async fn add_then_toggle_moves_place_to_visited() {
        let (store, group) = store_with_group(&["A"]).await;
        let session = ListSession::open(store, &group.id).await.unwrap();

        let added = session.add_place(fields("Tower", "A")).await.unwrap();
        let state = session.snapshot().await;
        assert_eq!(state.to_visit.len(), 1);
        assert!(!state.to_visit[0].visited);
        assert!(!state.to_visit[0].favorite);

        session.toggle_visited(&added.id).await.unwrap();
        let state = session.snapshot().await;
        assert_eq!(state.to_visit.len(), 0);
        assert_eq!(state.visited.len(), 1);
        assert!(state.pending_visit.is_none());
    }

    #[tokio::test]
    async fn toggle_back_returns_place_to_to_visit() {
        let (store, group) = store_with_group(&["A"]).await;
        let session = ListSession::open(store, &group.id).await.unwrap();
        let added = session.add_place(fields("Tower", "A")).await.unwrap();

        session.toggle_visited(&added.id).await.unwrap();
        session.toggle_visited(&added.id).await.unwrap();
        let state = session.snapshot().await;
        assert_eq!(state.to_visit.len(), 1);
        assert!(state.visited.is_empty());
    }

    #[tokio::test]
    async fn favorite_on_visited_place_stays_in_visited() {
        let (store, group) = store_with_group(&["A"]).await;
        let session = ListSession::open(store, &group.id).await.unwrap();
        let added = session.add_place(fields("Tower", "A")).await.unwrap();
        session.toggle_visited(&added.id).await.unwrap();

        session.toggle_favorite(&added.id).await.unwrap();
        let state = session.snapshot().await;
        assert_eq!(state.visited.len(), 1);
        assert!(state.visited[0].favorite);
        let favorites = state.view(ViewKind::Favorites);
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, added.id);
    }

    #[tokio::test]
    async fn add_place_requires_title_and_member() {
        let (store, group) = store_with_group(&["A"]).await;
        let session = ListSession::open(store, &group.id).await.unwrap();

        let err = session.add_place(fields("  ", "A")).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        let err = session.add_place(fields("Tower", "")).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(session.snapshot().await.to_visit.is_empty());
    }

    #[tokio::test]
    async fn edit_rewrites_fields_without_touching_flags() {
        let (store, group) = store_with_group(&["A", "B"]).await;
        let session = ListSession::open(store, &group.id).await.unwrap();
        let added = session.add_place(fields("Tower", "A")).await.unwrap();
        session.toggle_favorite(&added.id).await.unwrap();

        let edited = PlaceFields {
            title: "Tower Bridge".to_string(),
            note: "at night".to_string(),
            link: "https://example.com".to_string(),
            member: "B".to_string(),
        };
        session.edit_place(&added.id, edited).await.unwrap();

        let state = session.snapshot().await;
        assert_eq!(state.to_visit.len(), 1);
        let place = &state.to_visit[0];
        assert_eq!(place.title, "Tower Bridge");
        assert_eq!(place.member, "B");
        assert!(place.favorite);
        assert!(!place.visited);
    }

    #[tokio::test]
    async fn delete_mid_edit_removes_place() {
        let (store, group) = store_with_group(&["A"]).await;
        let session = ListSession::open(store, &group.id).await.unwrap();
        let added = session.add_place(fields("Tower", "A")).await.unwrap();

        session.delete_place(&added.id).await.unwrap();
        let state = session.snapshot().await;
        assert!(state.to_visit.is_empty());
        assert!(state.visited.is_empty());
    }

    #[tokio::test]
    async fn member_removal_is_persisted() {
        let (store, group) = store_with_group(&["A", "B"]).await;
        let session = ListSession::open(store.clone(), &group.id).await.unwrap();

        session.set_members(vec!["A".to_string()]).await.unwrap();
        assert_eq!(session.snapshot().await.members, vec!["A".to_string()]);
        let stored = store.fetch_group(&group.id).await.unwrap().unwrap();
        assert_eq!(stored.members, vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn echoed_insert_does_not_duplicate() {
        let (store, group) = store_with_group(&["A"]).await;
        let session = ListSession::open(store, &group.id).await.unwrap();

        let added = session.add_place(fields("Tower", "A")).await.unwrap();
        // 等订阅回声送达后再检查没有第二份
        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = session.snapshot().await;
        assert_eq!(state.to_visit.len(), 1);
        assert_eq!(state.to_visit[0].id, added.id);
    }

    #[tokio::test]
    async fn external_writes_arrive_through_subscription() {
        let (store, group) = store_with_group(&["A"]).await;
        let session = ListSession::open(store.clone(), &group.id).await.unwrap();

        let external = store
            .insert_place(crate::store::NewPlace {
                group_id: group.id.clone(),
                title: "Museum".to_string(),
                note: String::new(),
                link: String::new(),
                visited: true,
                favorite: false,
                member: "A".to_string(),
            })
            .await
            .unwrap();

        // 插入按 visited 标志分区，而不是一律进 to_visit
        wait_until(&session, |state| {
            state.visited.iter().any(|p| p.id == external.id)
        })
        .await;
        assert!(session.snapshot().await.to_visit.is_empty());
    }

    #[tokio::test]
    async fn closed_session_stops_listening_and_reopen_refetches() {
        let (store, group) = store_with_group(&["A"]).await;
        let manager = SyncManager::new(store.clone() as Arc<dyn RemoteStore>);

        let session = manager.open(&group.id).await.unwrap();
        session.add_place(fields("Tower", "A")).await.unwrap();
        assert!(manager.close(&group.id).await);
        assert!(matches!(
            manager.session(&group.id).await.err().unwrap(),
            SyncError::NotOpen(_)
        ));
        drop(session);

        // 会话关闭期间的写入不被缓冲，重开时整批重拉补齐
        store
            .insert_place(crate::store::NewPlace {
                group_id: group.id.clone(),
                title: "Museum".to_string(),
                note: String::new(),
                link: String::new(),
                visited: false,
                favorite: false,
                member: "A".to_string(),
            })
            .await
            .unwrap();

        let reopened = manager.open(&group.id).await.unwrap();
        assert_eq!(reopened.snapshot().await.to_visit.len(), 2);
    }

    /// 包装存储：行更新固定失败，其余操作透传
    struct FailingUpdates {
        inner: Arc<MemoryStore>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl RemoteStore for FailingUpdates {
        async fn create_group(&self, group: NewGroup) -> Result<GroupRecord, StoreError> {
            self.inner.create_group(group).await
        }

        async fn fetch_group(&self, group_id: &str) -> Result<Option<GroupRecord>, StoreError> {
            self.inner.fetch_group(group_id).await
        }

        async fn update_group(
            &self,
            group_id: &str,
            patch: GroupPatch,
        ) -> Result<GroupRecord, StoreError> {
            self.inner.update_group(group_id, patch).await
        }

        async fn fetch_places(
            &self,
            group_id: &str,
        ) -> Result<Vec<crate::store::PlaceRecord>, StoreError> {
            self.inner.fetch_places(group_id).await
        }

        async fn insert_place(
            &self,
            place: crate::store::NewPlace,
        ) -> Result<crate::store::PlaceRecord, StoreError> {
            self.inner.insert_place(place).await
        }

        async fn update_place(
            &self,
            place_id: &str,
            patch: PlacePatch,
        ) -> Result<crate::store::PlaceRecord, StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Status {
                    code: 503,
                    message: "unavailable".to_string(),
                });
            }
            self.inner.update_place(place_id, patch).await
        }

        async fn delete_place(&self, place_id: &str) -> Result<(), StoreError> {
            self.inner.delete_place(place_id).await
        }

        async fn subscribe(&self, group_id: &str) -> Result<Subscription, StoreError> {
            self.inner.subscribe(group_id).await
        }
    }

    #[tokio::test]
    async fn failed_toggle_resets_pending_and_leaves_state_unchanged() {
        let (memory, group) = store_with_group(&["A"]).await;
        let store = Arc::new(FailingUpdates {
            inner: memory,
            failing: AtomicBool::new(false),
        });
        let session = ListSession::open(store.clone() as Arc<dyn RemoteStore>, &group.id)
            .await
            .unwrap();
        let added = session.add_place(fields("Tower", "A")).await.unwrap();

        store.failing.store(true, Ordering::SeqCst);
        let err = session.toggle_visited(&added.id).await.unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Status { .. })));

        let state = session.snapshot().await;
        assert!(state.pending_visit.is_none());
        assert_eq!(state.to_visit.len(), 1);
        assert!(state.visited.is_empty());
        assert!(!state.to_visit[0].visited);
    }

    #[tokio::test]
    async fn reopening_same_group_returns_live_session() {
        let (store, group) = store_with_group(&["A"]).await;
        let manager = SyncManager::new(store as Arc<dyn RemoteStore>);

        let first = manager.open(&group.id).await.unwrap();
        first.add_place(fields("Tower", "A")).await.unwrap();
        let second = manager.open(&group.id).await.unwrap();
        assert_eq!(second.snapshot().await.to_visit.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
