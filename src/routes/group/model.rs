use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{GroupRecord, NewGroup, RemoteStore, StoreError};
use crate::sync::SyncError;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameGroupRequest {
    pub group_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMembersRequest {
    pub group_id: String,
    pub members: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub name: String,
    pub members: Vec<String>,
    pub share_token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub url: String,
}

impl From<GroupRecord> for GroupInfo {
    fn from(group: GroupRecord) -> Self {
        Self {
            group_id: group.id,
            name: group.name,
            members: group.members,
            share_token: group.share_token,
            created_at: group.created_at,
        }
    }
}

impl GroupRecord {
    /// 建群：群组名和至少一名成员为必填，分享令牌在此处铸造
    pub async fn create(
        store: &dyn RemoteStore,
        req: CreateGroupRequest,
    ) -> Result<GroupRecord, SyncError> {
        if req.name.trim().is_empty() {
            return Err(SyncError::Validation("Group name is required".to_string()));
        }
        if req.members.is_empty() {
            return Err(SyncError::Validation(
                "At least one member is required".to_string(),
            ));
        }
        if req.members.iter().any(|m| m.trim().is_empty()) {
            return Err(SyncError::Validation("Member name is required".to_string()));
        }

        let group = store
            .create_group(NewGroup {
                name: req.name,
                members: req.members,
                share_token: Uuid::new_v4().to_string(),
            })
            .await?;
        Ok(group)
    }

    pub async fn find_by_id(
        store: &dyn RemoteStore,
        group_id: &str,
    ) -> Result<Option<GroupRecord>, StoreError> {
        store.fetch_group(group_id).await
    }
}
