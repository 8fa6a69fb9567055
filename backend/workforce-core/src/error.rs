// src/error.rs
use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Field name -> messages, returned to forms the same way for every endpoint.
pub type ErrorBag = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("The given data was invalid")]
    Validation(ErrorBag),

    #[error("{0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Cannot move {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("CSV export error")]
    Csv(#[from] csv::Error),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut bag = ErrorBag::new();
        bag.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(bag)
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

// Helper to create context-aware IO errors
pub fn io_context<S: Into<String>>(source: std::io::Error, context: S) -> AppError {
    AppError::Io {
        source,
        context: context.into(),
    }
}

/// Collects field errors before deciding whether a payload is acceptable.
#[derive(Debug, Default)]
pub struct Validator {
    bag: ErrorBag,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.bag
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
        }
        self
    }

    pub fn require(&mut self, value: &str, field: &str) -> &mut Self {
        let message = format!("The {} field is required.", field.replace('_', " "));
        self.check(!value.trim().is_empty(), field, &message)
    }

    pub fn finish(&mut self) -> Result<(), AppError> {
        if self.bag.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.bag)))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(bag) => {
                warn!("Validation failed: {:?}", bag);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "message": self.to_string(), "errors": bag }),
                )
            }
            AppError::Authentication(message) => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": message }),
            ),
            AppError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                json!({ "message": self.to_string() }),
            ),
            AppError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                json!({ "message": self.to_string() }),
            ),
            AppError::InvalidTransition { .. } | AppError::Conflict(_) => (
                StatusCode::CONFLICT,
                json!({ "message": self.to_string() }),
            ),
            AppError::Io { source, context } => {
                error!("I/O error ({}): {}", context, source);
                internal()
            }
            AppError::Json(e) => {
                error!("JSON processing error: {}", e);
                internal()
            }
            AppError::Csv(e) => {
                error!("CSV export error: {}", e);
                internal()
            }
            AppError::LockError(msg) => {
                error!("Concurrency lock error: {}", msg);
                internal()
            }
            AppError::ConfigError(msg) => {
                error!("Configuration error: {}", msg);
                internal()
            }
        };
        (status, Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "message": "Internal server error." }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_collects_every_failed_field() {
        let result = Validator::new()
            .require("", "name")
            .require("  ", "bank_name")
            .check(false, "name", "The name must be short.")
            .finish();

        match result {
            Err(AppError::Validation(bag)) => {
                assert_eq!(bag["name"].len(), 2);
                assert_eq!(bag["bank_name"], vec!["The bank name field is required."]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn validation_maps_to_unprocessable_entity() {
        let response = AppError::invalid("nik", "bad").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let response = AppError::Authentication("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
