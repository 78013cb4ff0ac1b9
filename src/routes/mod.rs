pub mod group;
pub mod list;

use axum::http::StatusCode;

use crate::store::StoreError;
use crate::sync::SyncError;
use crate::utils::error_codes;

/// 同步层错误到响应状态与错误码的统一映射
pub(crate) fn sync_error_parts(e: &SyncError) -> (StatusCode, i32) {
    match e {
        SyncError::Validation(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
        SyncError::GroupNotFound
        | SyncError::PlaceNotFound
        | SyncError::NotOpen(_)
        | SyncError::Store(StoreError::NotFound) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
        SyncError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
        ),
    }
}
