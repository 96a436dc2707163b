//! Standard response envelope helpers and HTML responses for views.

use crate::error::{AppError, ErrorBody, ErrorDetail};
use crate::render::Page;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data, meta: None }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data, meta: None }))
}

pub fn error_body(code: &str, message: String) -> ErrorBody {
    ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message,
        },
    }
}

/// A view wrapped in the default document.
pub struct HtmlPage(pub Page);

impl IntoResponse for HtmlPage {
    fn into_response(self) -> Response {
        Html(self.0.to_document()).into_response()
    }
}

/// Error of an HTML view: status code with the public message as plain text.
#[derive(Debug)]
pub struct HtmlError(pub AppError);

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        HtmlError(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let (status, code) = self.0.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, code, "view failed");
        }
        let text = match &self.0 {
            AppError::AccessDenied { .. } => "Access Denied".to_string(),
            other => other.public_message(),
        };
        (status, text).into_response()
    }
}
