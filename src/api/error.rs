use super::response::failure;
use crate::repo::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    Validation = 1000,
    InvalidIntegrator = 1001,
    Database = 9001,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::Validation => "validation error",
            ErrorCode::InvalidIntegrator => "invalid integrator address",
            ErrorCode::Database => "database error",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid integrator address: {0}")]
    InvalidIntegrator(String),
    #[error("database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::Validation,
            AppError::InvalidIntegrator(_) => ErrorCode::InvalidIntegrator,
            AppError::Database(_) => ErrorCode::Database,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidIntegrator(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            // store details stay in the logs
            AppError::Database(_) => self.code().default_message().to_string(),
            _ => self.to_string(),
        };
        failure(self.status(), self.code(), message)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Database(e.to_string())
    }
}
