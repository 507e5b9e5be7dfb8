use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use notification_channel::ChannelError;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Message returned to producers whose submission lacks a field
pub const MISSING_FIELDS_MESSAGE: &str = "User, text, and type are required";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("{}", MISSING_FIELDS_MESSAGE)]
    Validation,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Relay is not accepting notifications")]
    NotAccepting,

    #[error("Channel backend unavailable")]
    BackendUnavailable,

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("lifecycle error: {0}")]
    Lifecycle(String),
}

impl From<ChannelError> for AppError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::NotConnected | ChannelError::SubscriptionClosed(_) => {
                AppError::BackendUnavailable
            }
            other => AppError::Publish(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::StartServer(e.to_string())
    }
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation | AppError::InvalidBody(_) => 400,
            AppError::NotAccepting | AppError::BackendUnavailable => 503,
            _ => 500,
        }
    }

    /// Text placed in the `error` field of the response body.
    ///
    /// Backend details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation
            | AppError::InvalidBody(_)
            | AppError::NotAccepting
            | AppError::BackendUnavailable => self.to_string(),
            AppError::Publish(_) => "Failed to publish notification".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = ResponseError::status_code(self);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(status).json(json!({ "error": self.public_message() }))
    }
}
