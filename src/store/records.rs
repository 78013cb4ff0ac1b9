use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// groups 表的一行。字段名沿用存储端的列名（groupname / sharedurl）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    #[serde(rename = "groupname")]
    pub name: String,
    pub members: Vec<String>,
    #[serde(rename = "sharedurl")]
    pub share_token: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGroup {
    #[serde(rename = "groupname")]
    pub name: String,
    pub members: Vec<String>,
    #[serde(rename = "sharedurl")]
    pub share_token: String,
}

/// groups 表的部分更新，None 的字段不出现在请求体里
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupPatch {
    #[serde(rename = "groupname", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

/// places 表的一行，一行终生只属于一个群组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub id: String,
    #[serde(rename = "groupid")]
    pub group_id: String,
    pub title: String,
    #[serde(default)]
    pub note: String,
    #[serde(rename = "url", default)]
    pub link: String,
    pub visited: bool,
    #[serde(default)]
    pub favorite: bool,
    pub member: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPlace {
    #[serde(rename = "groupid")]
    pub group_id: String,
    pub title: String,
    pub note: String,
    #[serde(rename = "url")]
    pub link: String,
    pub visited: bool,
    pub favorite: bool,
    pub member: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlacePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "url", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

/// 实时通道送达的单条变更，只针对 places 表
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Inserted(PlaceRecord),
    Updated(PlaceRecord),
    Deleted { id: String },
}
