//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Text shown to the client for configuration and schema failures. Details go to the log.
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong, see log for details.";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("primary key not found in table {0}")]
    NoPrimaryKey(String),
    #[error("column {column} not found in table {table}")]
    UnknownColumn { table: String, column: String },
    #[error("schema query for {table}: {source}")]
    Db {
        table: String,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no configuration found for entity '{0}'")]
    NotFound(String),
    #[error("failed to read configuration of entity '{entity}': {message}")]
    Source { entity: String, message: String },
    #[error("failed to parse configuration JSON of entity '{entity}': {message}")]
    Parse { entity: String, message: String },
    #[error("cannot load parent '{parent}' of entity '{entity}': {source}")]
    Parent {
        entity: String,
        parent: String,
        #[source]
        source: Box<ConfigError>,
    },
    #[error("parent chain of entity '{0}' is cyclic or deeper than {1}")]
    ParentChainTooDeep(String, usize),
    #[error("entity '{0}' uses {{{{variables}}}} but no variable resolver is configured")]
    MissingVariableResolver(String),
    #[error("invalid editor '{editor}' for field '{field}' of entity '{entity}'")]
    InvalidEditor {
        entity: String,
        field: String,
        editor: String,
    },
    #[error("entity '{0}' has no known primary key")]
    MissingPrimaryKey(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("access denied: {action} on {entity}")]
    AccessDenied { entity: String, action: String },
    #[error("{0}")]
    Vetoed(String),
    #[error("{0}")]
    Persistence(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("request deadline exceeded")]
    Timeout,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::AccessDenied { .. } => (StatusCode::FORBIDDEN, "access_denied"),
            AppError::Vetoed(_) => (StatusCode::FORBIDDEN, "vetoed"),
            AppError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        }
    }

    /// Message safe to show to the client: internal failures are replaced by a generic text.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Config(_) | AppError::Schema(_) | AppError::Db(_) => SOMETHING_WENT_WRONG.to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.public_message(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::Config(ConfigError::Parse {
            entity: "order".into(),
            message: "expected value at line 1".into(),
        });
        assert_eq!(err.public_message(), SOMETHING_WENT_WRONG);
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_errors_name_the_field() {
        let err = AppError::Validation("Field 'email' is required".into());
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
        assert!(err.public_message().contains("email"));
    }
}
