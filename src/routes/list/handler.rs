use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;

use super::model::{
    AddPlaceRequest, EditPlaceRequest, GroupIdRequest, ListSnapshot, PlaceActionRequest,
    ViewQuery, ViewResponse,
};
use crate::routes::sync_error_parts;
use crate::sync::ViewKind;
use crate::utils::{error_to_api_response, success_to_api_response};

/// 打开群组的列表视图：整批拉取 + 挂订阅，重复打开复用现有会话
#[axum::debug_handler]
pub async fn open_list(
    State(state): State<AppState>,
    Json(req): Json<GroupIdRequest>,
) -> impl IntoResponse {
    match state.sync.open(&req.group_id).await {
        Ok(session) => (
            StatusCode::OK,
            success_to_api_response(ListSnapshot::from(session.snapshot().await)),
        ),
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

/// 关闭即停止监听，错过的事件不补
#[axum::debug_handler]
pub async fn close_list(
    State(state): State<AppState>,
    Json(req): Json<GroupIdRequest>,
) -> impl IntoResponse {
    let closed = state.sync.close(&req.group_id).await;
    (
        StatusCode::OK,
        success_to_api_response(serde_json::json!({
            "closed": closed
        })),
    )
}

#[axum::debug_handler]
pub async fn refresh_list(
    State(state): State<AppState>,
    Json(req): Json<GroupIdRequest>,
) -> impl IntoResponse {
    let result = match state.sync.session(&req.group_id).await {
        Ok(session) => session.refresh().await.map(|_| session),
        Err(e) => Err(e),
    };
    match result {
        Ok(session) => (
            StatusCode::OK,
            success_to_api_response(ListSnapshot::from(session.snapshot().await)),
        ),
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn get_view(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> impl IntoResponse {
    match state.sync.session(&query.group_id).await {
        Ok(session) => {
            let kind = query.view.unwrap_or(ViewKind::ToVisit);
            (
                StatusCode::OK,
                success_to_api_response(ViewResponse::from_state(session.snapshot().await, kind)),
            )
        }
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn add_place(
    State(state): State<AppState>,
    Json(req): Json<AddPlaceRequest>,
) -> impl IntoResponse {
    let result = match state.sync.session(&req.group_id).await {
        Ok(session) => session.add_place(req.into_fields()).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(place) => (StatusCode::CREATED, success_to_api_response(place)),
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn toggle_visited(
    State(state): State<AppState>,
    Json(req): Json<PlaceActionRequest>,
) -> impl IntoResponse {
    let result = match state.sync.session(&req.group_id).await {
        Ok(session) => session.toggle_visited(&req.place_id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(place) => (StatusCode::OK, success_to_api_response(place)),
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Json(req): Json<PlaceActionRequest>,
) -> impl IntoResponse {
    let result = match state.sync.session(&req.group_id).await {
        Ok(session) => session.toggle_favorite(&req.place_id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(place) => (StatusCode::OK, success_to_api_response(place)),
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn edit_place(
    State(state): State<AppState>,
    Json(req): Json<EditPlaceRequest>,
) -> impl IntoResponse {
    let result = match state.sync.session(&req.group_id).await {
        Ok(session) => {
            let place_id = req.place_id.clone();
            session.edit_place(&place_id, req.into_fields()).await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(place) => (StatusCode::OK, success_to_api_response(place)),
        Err(e) => {
            let (status, code) = sync_error_parts(&e);
            (status, error_to_api_response(code, e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn delete_place(
    State(state): State<AppState>,
    Json(req): Json<PlaceActionRequest>,
) -> impl IntoResponse {
    let result = match state.sync.session(&req.group_id).await {
        Ok(session) => session.delete_place(&req.place_id).await,
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
