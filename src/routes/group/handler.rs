use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;

use super::model::{
    CreateGroupRequest, GroupInfo, RenameGroupRequest, ShareLinkResponse, UpdateMembersRequest,
};
use crate::routes::sync_error_parts;
use crate::store::GroupRecord;
use crate::utils::{error_codes, error_to_api_response, success_to_api_response};

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub group_id: String,
}

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> impl IntoResponse {
    match GroupRecord::create(state.store.as_ref(), req).await {
        Ok(group) => (
            StatusCode::CREATED,
            success_to_api_response(GroupInfo::from(group)),
        ),
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn find_by_id(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> impl IntoResponse {
    match GroupRecord::find_by_id(state.store.as_ref(), &query.group_id).await {
        Ok(Some(group)) => (
            StatusCode::OK,
            success_to_api_response(GroupInfo::from(group)),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Group not found".to_string()),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

/// 分享链接对未知群组返回 404，其余情况固定拼 <origin>/list/<groupId>
#[axum::debug_handler]
pub async fn share_link(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> impl IntoResponse {
    match GroupRecord::find_by_id(state.store.as_ref(), &query.group_id).await {
        Ok(Some(group)) => (
            StatusCode::OK,
            success_to_api_response(ShareLinkResponse {
                url: state.config.share_link(&group.id),
            }),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Group not found".to_string()),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn rename_group(
    State(state): State<AppState>,
    Json(req): Json<RenameGroupRequest>,
) -> impl IntoResponse {
    let result = match state.sync.session(&req.group_id).await {
        Ok(session) => session.rename_group(&req.name).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "success": true
            })),
        ),
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn update_members(
    State(state): State<AppState>,
    Json(req): Json<UpdateMembersRequest>,
) -> impl IntoResponse {
    let result = match state.sync.session(&req.group_id).await {
        Ok(session) => session.set_members(req.members).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "success": true
            })),
        ),
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}
