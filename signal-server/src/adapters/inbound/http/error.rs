use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// RFC 9457 Problem Details response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self { type_uri: type_uri.into(), title: title.into(), status: status.as_u16(), detail: None, instance: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        let status = StatusCode::NOT_FOUND;
        Self::new("https://copier.example.com/errors/not-found", "Not Found", status)
            .with_detail(format!("{} not found", resource.into()))
    }

    pub fn validation_error(detail: impl Into<String>) -> Self {
        let status = StatusCode::BAD_REQUEST;
        Self::new("https://copier.example.com/errors/validation", "Bad Request", status).with_detail(detail)
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self::new("https://copier.example.com/errors/internal", "Internal Server Error", status).with_detail(detail)
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self)).into_response();
        response
            .headers_mut()
            .insert(axum::http::header::CONTENT_TYPE, axum::http::HeaderValue::from_static("application/problem+json"));
        response
    }
}
