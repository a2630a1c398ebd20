//! Axum handlers. Each wraps one public operation and maps [`CoreError`]
//! onto an HTTP status.

pub mod cache;
pub mod clusters;
pub mod participants;
pub mod search;

use axum::http::StatusCode;

use crate::error::CoreError;

pub type ApiError = (StatusCode, String);

pub(crate) fn api_error(err: CoreError) -> ApiError {
    let status = match &err {
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        CoreError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
        CoreError::Store(_) | CoreError::Clustering(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    }
    (status, err.to_string())
}
