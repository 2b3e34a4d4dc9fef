use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Failure of a team/member/notification operation.
///
/// `NotFound` messages are the ones clients match on ("Team not found",
/// "Invalid sender member", ...), so keep their wording stable.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error shape returned by every handler.
pub type ApiError = (StatusCode, Json<Value>);

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Database(_) | ServiceError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        if e.is_internal() {
            tracing::error!("Request failed: {}", e);
        }
        (e.status(), Json(json!({ "error": e.to_string() })))
    }
}

/// Trim a name and reject it when nothing is left.
pub fn require_name(raw: &str, what: &str) -> ServiceResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation(format!("{what} name is required")));
    }
    Ok(name.to_string())
}
