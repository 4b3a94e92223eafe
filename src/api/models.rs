use crate::ledger::models::*;
use crate::notifications::models::Notification;
use crate::reminders::scheduler::BatchReport;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

// ========== REQUEST MODELS ==========

/// Request to open a split between the creator and their invitees
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSplitRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
    pub total_amount: Decimal,
    pub split_type: SplitType,
    pub creator_id: Uuid,

    /// Invitees, creator excluded
    #[validate(length(min = 1, message = "at least one participant is required"))]
    pub participants: Vec<ParticipantShare>,

    /// Required for specified splits
    pub creator_share: Option<Decimal>,

    #[validate(length(min = 1, max = 512, message = "receipt reference must be 1-512 characters"))]
    pub receipt_ref: Option<String>,
}

impl From<CreateSplitRequest> for NewSplit {
    fn from(request: CreateSplitRequest) -> Self {
        NewSplit {
            name: request.name,
            total_amount: request.total_amount,
            split_type: request.split_type,
            creator_id: request.creator_id,
            participants: request.participants,
            creator_share: request.creator_share,
            receipt_ref: request.receipt_ref,
        }
    }
}

/// Pay, accept or decline a share
#[derive(Debug, Deserialize)]
pub struct ShareActionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DepositRequest {
    pub amount: Decimal,
    #[validate(length(max = 200, message = "description is limited to 200 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct ShareStatusResponse {
    pub split_event_id: Uuid,
    pub user_id: Uuid,
    pub event_status: SplitStatus,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub wallet: Wallet,
    pub recent_transactions: Vec<WalletTransaction>,
}

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub id: Uuid,
    pub read: bool,
}

#[derive(Debug, Serialize)]
pub struct ReminderRunResponse {
    pub users: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub pushed: usize,
    pub failed: Vec<Uuid>,
}

impl From<BatchReport> for ReminderRunResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            users: report.users,
            delivered: report.delivered,
            skipped: report.skipped,
            pushed: report.pushed,
            failed: report.failed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_limit_is_clamped() {
        assert_eq!(PageQuery::default().limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(PageQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(PageQuery { limit: Some(10_000) }.limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_split_request_validation() {
        let request: CreateSplitRequest = serde_json::from_value(serde_json::json!({
            "name": "",
            "total_amount": "90.00",
            "split_type": "equal",
            "creator_id": Uuid::new_v4(),
            "participants": [],
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("participants"));
    }
}
