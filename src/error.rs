/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - validation error / request error / 想定外 error を統一的に分類
 */
use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repos::error::RepoError;

/// Wire format of every error answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

/// Per-field validation failures collected before touching the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, error: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            error: error.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.error))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Response already produced for a shutdown error on its way out.
pub struct Written(Response);

impl Written {
    pub fn into_inner(self) -> Response {
        self.0
    }
}

impl fmt::Debug for Written {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Written").field(&self.0.status()).finish()
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Trusted error: the message is shown to the client.
    #[error("{message}")]
    Request { status: StatusCode, message: String },

    #[error("data validation error: {0}")]
    Validation(FieldErrors),

    /// Integrity failure. The service must shut down after answering.
    #[error("shutdown requested: {reason}")]
    Shutdown {
        reason: String,
        written: Option<Written>,
    },

    /// Anything unclassified. Logged, never shown.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn request(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::request(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::request(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::request(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::request(StatusCode::NOT_FOUND, format!("{resource} not found"))
    }

    pub fn shutdown(reason: impl Into<String>) -> Self {
        Self::Shutdown {
            reason: reason.into(),
            written: None,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown { .. })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Request { status, .. } => *status,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Shutdown {
                written: Some(w), ..
            } => w.0.status(),
            Self::Shutdown { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classification used by the error middleware.
    pub fn error_response(&self) -> (StatusCode, ErrorResponse) {
        let body = match self {
            Self::Validation(fields) => ErrorResponse {
                error: "data validation error".to_string(),
                fields: Some(fields.fields().to_vec()),
            },
            Self::Request { message, .. } => ErrorResponse {
                error: message.clone(),
                fields: None,
            },
            Self::Shutdown { .. } | Self::Internal(_) => ErrorResponse {
                error: internal_error_text(),
                fields: None,
            },
        };

        let status = match self {
            Self::Shutdown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => self.status(),
        };
        (status, body)
    }

    /// Attach the response already sent for a shutdown error. Other variants
    /// are returned unchanged.
    pub fn with_written(self, response: Response) -> Self {
        match self {
            Self::Shutdown { reason, .. } => Self::Shutdown {
                reason,
                written: Some(Written(response)),
            },
            other => other,
        }
    }
}

fn internal_error_text() -> String {
    StatusCode::INTERNAL_SERVER_ERROR
        .canonical_reason()
        .unwrap_or("Internal Server Error")
        .to_string()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Shutdown {
            written: Some(written),
            ..
        } = self
        {
            return written.into_inner();
        }

        let (status, body) = self.error_response();
        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => AppError::not_found("user"),
            RepoError::DuplicateEmail => {
                AppError::request(StatusCode::CONFLICT, "email is already in use")
            }
            RepoError::Db(e) => AppError::Internal(e.into()),
        }
    }
}
