use serde::{Deserialize, Serialize};

use crate::store::PlaceRecord;
use crate::sync::{ListState, PlaceFields, ViewKind};

#[derive(Debug, Deserialize)]
pub struct GroupIdRequest {
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub group_id: String,
    /// 省略时默认 to-visit
    pub view: Option<ViewKind>,
}

#[derive(Debug, Deserialize)]
pub struct AddPlaceRequest {
    pub group_id: String,
    pub title: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub link: String,
    pub member: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceActionRequest {
    pub group_id: String,
    pub place_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EditPlaceRequest {
    pub group_id: String,
    pub place_id: String,
    pub title: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub link: String,
    pub member: String,
}

/// 打开会话时返回的完整快照
#[derive(Debug, Serialize)]
pub struct ListSnapshot {
    pub group_name: String,
    pub members: Vec<String>,
    pub to_visit: Vec<PlaceRecord>,
    pub visited: Vec<PlaceRecord>,
    pub pending_visit: Option<String>,
}

/// 单个派生视图
#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub group_name: String,
    pub members: Vec<String>,
    pub places: Vec<PlaceRecord>,
    pub pending_visit: Option<String>,
}

impl From<ListState> for ListSnapshot {
    fn from(state: ListState) -> Self {
        Self {
            group_name: state.group_name,
            members: state.members,
            to_visit: state.to_visit,
            visited: state.visited,
            pending_visit: state.pending_visit,
        }
    }
}

impl ViewResponse {
    pub fn from_state(state: ListState, kind: ViewKind) -> Self {
        let places = state.view(kind);
        Self {
            group_name: state.group_name,
            members: state.members,
            places,
            pending_visit: state.pending_visit,
        }
    }
}

impl AddPlaceRequest {
    pub fn into_fields(self) -> PlaceFields {
        PlaceFields {
            title: self.title,
            note: self.note,
            link: self.link,
            member: self.member,
        }
    }
}

impl EditPlaceRequest {
    pub fn into_fields(self) -> PlaceFields {
        PlaceFields {
            title: self.title,
            note: self.note,
            link: self.link,
            member: self.member,
        }
    }
}
