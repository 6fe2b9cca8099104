use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Failures of the user/notification document stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("update rejected: {0}")]
    Conflict(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Error returned by every JSON handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Unauthorized {
        message: String,
        redirect_to: Option<String>,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict {
        message: String,
        redirect_to: Option<String>,
    },

    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("{message}")]
    Field {
        status: StatusCode,
        field: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            redirect_to: Some("/login".into()),
        }
    }

    pub fn conflict(message: impl Into<String>, redirect_to: Option<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            redirect_to,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Field { status, .. } => *status,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("User not found".into()),
            StoreError::DuplicateEmail => ApiError::Field {
                status: StatusCode::CONFLICT,
                field: Some("email".into()),
                message: "Email already registered".into(),
            },
            StoreError::Conflict(msg) => ApiError::conflict(msg, None),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (field, redirect_to) = match &self {
            Self::Unauthorized { redirect_to, .. } | Self::Conflict { redirect_to, .. } => {
                (None, redirect_to.clone())
            }
            Self::Validation { field, .. } => (Some(field.clone()), None),
            Self::Field { field, .. } => (field.clone(), None),
            _ => (None, None),
        };
        let message = match &self {
            Self::Internal(e) => {
                error!(error = %e, "internal error");
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(ErrorBody {
                error: message,
                field,
                redirect_to,
            }),
        )
            .into_response()
    }
}
