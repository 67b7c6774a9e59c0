use super::error::ErrorCode;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Body shared by every endpoint: `{ code, message, data? }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

pub fn ok<T: Serialize>(data: T) -> Response {
    ApiResponse {
        code: ErrorCode::Ok.code(),
        message: ErrorCode::Ok.default_message().to_string(),
        data: Some(data),
    }
    .with_status(StatusCode::OK)
}

pub fn failure(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
) -> Response {
    ApiResponse::<()> {
        code: code.code(),
        message: message.into(),
        data: None,
    }
    .with_status(status)
}
