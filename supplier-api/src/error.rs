use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use supplier_core::{CacheError, ChannelError, CommandError, QueryError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    ChannelUnavailable(ChannelError),
    #[error("{0}")]
    QueryUnavailable(QueryError),
    #[error("{0}")]
    CacheUnavailable(CacheError),
    #[error("{0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ChannelUnavailable(err) => {
                tracing::error!("Publish failed: {}", err);
                (StatusCode::SERVICE_UNAVAILABLE, "Message channel unavailable".to_string())
            }
            AppError::QueryUnavailable(err) => {
                tracing::error!("Supplier query failed: {}", err);
                (StatusCode::SERVICE_UNAVAILABLE, "Supplier query service unavailable".to_string())
            }
            AppError::CacheUnavailable(err) => {
                tracing::error!("Cache invalidation failed: {}", err);
                (StatusCode::SERVICE_UNAVAILABLE, "Supplier cache unavailable".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ChannelError> for AppError {
    fn from(err: ChannelError) -> Self {
        Self::ChannelUnavailable(err)
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        Self::QueryUnavailable(err)
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        Self::CacheUnavailable(err)
    }
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        Self::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalServerError(err.to_string())
    }
}
