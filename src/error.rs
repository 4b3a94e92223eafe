use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::models::ParticipantStatus;
use crate::notifications::models::DeliveryErrorKind;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Reminder error: {0}")]
    Reminder(#[from] ReminderError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External error: {0}")]
    ExternalError(String),
}

/// Split and wallet errors. All of them are raised before any row is mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid share: {0}")]
    InvalidShare(String),

    #[error("A receipt is required for a specified split")]
    MissingReceipt,

    #[error("Invalid participants: {0}")]
    InvalidParticipants(String),

    #[error("Split event not found: {0}")]
    SplitNotFound(Uuid),

    #[error("Participant {user_id} not found in split {event_id}")]
    ParticipantNotFound { event_id: Uuid, user_id: Uuid },

    #[error("Share already settled (status: {status})")]
    AlreadySettled { status: ParticipantStatus },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },
}

/// Errors raised by a single delivery attempt or by the notification store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Delivery failed ({kind}): {message}")]
    Delivery {
        kind: DeliveryErrorKind,
        message: String,
    },

    #[error("Not authorized to create a notification for user {recipient}")]
    Unauthorized { recipient: Uuid },

    #[error("Push gateway error: {0}")]
    Push(String),
}

impl NotificationError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        NotificationError::Delivery {
            kind: DeliveryErrorKind::Unreachable,
            message: message.into(),
        }
    }

    pub fn bad_response(message: impl Into<String>) -> Self {
        NotificationError::Delivery {
            kind: DeliveryErrorKind::BadResponse,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> DeliveryErrorKind {
        match self {
            NotificationError::Delivery { kind, .. } => *kind,
            NotificationError::Unauthorized { .. } => DeliveryErrorKind::Unauthorized,
            NotificationError::Push(_) => DeliveryErrorKind::Unreachable,
        }
    }
}

/// Reminder batch errors. Never fatal for the scheduler loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReminderError {
    #[error("Reminder batch finished with {failed} of {total} users failing")]
    PartialBatchFailure {
        failed: usize,
        total: usize,
        users: Vec<Uuid>,
    },
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Ledger(LedgerError::InvalidAmount(reason)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_AMOUNT",
                format!("Invalid amount: {}", reason),
                None,
            ),
            AppError::Ledger(LedgerError::InvalidShare(reason)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_SHARE",
                format!("Invalid share: {}", reason),
                None,
            ),
            AppError::Ledger(LedgerError::MissingReceipt) => (
                StatusCode::BAD_REQUEST,
                "MISSING_RECEIPT",
                "Attach a receipt to create a split with specified amounts".to_string(),
                None,
            ),
            AppError::Ledger(LedgerError::InvalidParticipants(reason)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_PARTICIPANTS",
                reason,
                None,
            ),
            AppError::Ledger(LedgerError::SplitNotFound(id)) => (
                StatusCode::NOT_FOUND,
                "SPLIT_NOT_FOUND",
                format!("Split not found: {}", id),
                None,
            ),
            AppError::Ledger(LedgerError::ParticipantNotFound { event_id, user_id }) => (
                StatusCode::NOT_FOUND,
                "PARTICIPANT_NOT_FOUND",
                "You are not a participant of this split".to_string(),
                Some(serde_json::json!({
                    "split_event_id": event_id,
                    "user_id": user_id,
                })),
            ),
            AppError::Ledger(LedgerError::AlreadySettled { status }) => (
                StatusCode::CONFLICT,
                "ALREADY_SETTLED",
                format!("This share is already {}", status),
                Some(serde_json::json!({ "status": status })),
            ),
            AppError::Ledger(LedgerError::InsufficientFunds { required, available }) => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_FUNDS",
                format!(
                    "Your wallet balance ({}) is lower than your share ({}). Add funds and try again.",
                    available, required
                ),
                Some(serde_json::json!({
                    "required": required.to_string(),
                    "available": available.to_string(),
                })),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::InvalidInput(reason) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                reason,
                None,
            ),
            AppError::Notification(NotificationError::Unauthorized { .. }) => (
                StatusCode::FORBIDDEN,
                "UNAUTHORIZED",
                "Not allowed to notify this user".to_string(),
                None,
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalError(format!("HTTP request error: {:?}", error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
