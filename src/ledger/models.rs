use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use std::fmt;
use uuid::Uuid;

use crate::error::LedgerError;

/// Number of decimal places carried by every amount in the ledger
pub const MONEY_SCALE: u32 = 2;

/// Largest amount in cents that fits the `NUMERIC(12, 2)` money columns
pub const MAX_AMOUNT_CENTS: i64 = 999_999_999_999;

/// How the total of a split is shared between participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "split_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    Equal,
    Specified,
}

/// Split event status
///
/// `InProgress → Completed` once every participant has paid.
/// `InProgress → BlockedOnDecline` as soon as a participant declines; nothing
/// moves an event out of that state automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "split_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SplitStatus {
    InProgress,
    Completed,
    BlockedOnDecline,
}

impl SplitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitStatus::InProgress => "in_progress",
            SplitStatus::Completed => "completed",
            SplitStatus::BlockedOnDecline => "blocked_on_decline",
        }
    }

    /// Status an event should hold given the current participant statuses.
    ///
    /// Completed is terminal and is never left, whatever the input.
    pub fn evaluate(current: SplitStatus, participants: &[ParticipantStatus]) -> SplitStatus {
        if current == SplitStatus::Completed {
            return SplitStatus::Completed;
        }
        if !participants.is_empty() && participants.iter().all(|s| *s == ParticipantStatus::Paid) {
            return SplitStatus::Completed;
        }
        if participants.iter().any(|s| *s == ParticipantStatus::Declined) {
            return SplitStatus::BlockedOnDecline;
        }
        SplitStatus::InProgress
    }
}

impl fmt::Display for SplitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "participant_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Pending,
    Accepted,
    Paid,
    Declined,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Pending => "pending",
            ParticipantStatus::Accepted => "accepted",
            ParticipantStatus::Paid => "paid",
            ParticipantStatus::Declined => "declined",
        }
    }

    /// Still owes money
    pub fn is_outstanding(&self) -> bool {
        matches!(self, ParticipantStatus::Pending | ParticipantStatus::Accepted)
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status change a participant can make on their own share
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAction {
    Accept,
    Decline,
}

impl ShareAction {
    pub fn target(&self) -> ParticipantStatus {
        match self {
            ShareAction::Accept => ParticipantStatus::Accepted,
            ShareAction::Decline => ParticipantStatus::Declined,
        }
    }

    /// New status for a share currently in `from`, `None` when nothing changes
    pub fn apply(&self, from: ParticipantStatus) -> Result<Option<ParticipantStatus>, LedgerError> {
        match (self, from) {
            (ShareAction::Accept, ParticipantStatus::Pending) => Ok(Some(ParticipantStatus::Accepted)),
            (ShareAction::Accept, ParticipantStatus::Accepted) => Ok(None),
            (ShareAction::Decline, ParticipantStatus::Pending | ParticipantStatus::Accepted) => {
                Ok(Some(ParticipantStatus::Declined))
            }
            (_, status) => Err(LedgerError::AlreadySettled { status }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
    Payment,
}

///Split event entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SplitEvent {
    pub id: Uuid,
    pub name: String,
    pub total_amount: Decimal,
    pub split_type: SplitType,
    pub creator_id: Uuid,
    pub receipt_ref: Option<String>,
    pub status: SplitStatus,
    pub created_at: DateTime<Utc>,
}

///Participant entity - one user's obligation within a split event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub split_event_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub status: ParticipantStatus,
    pub is_creator: bool,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Participant {
    /// Check the share can still be paid
    pub fn ensure_payable(&self) -> Result<(), LedgerError> {
        if self.status.is_outstanding() {
            Ok(())
        } else {
            Err(LedgerError::AlreadySettled {
                status: self.status,
            })
        }
    }
}

///Wallet entity - one per user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub bank_connected: bool,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
            bank_connected: false,
            updated_at: Utc::now(),
        }
    }

    pub fn has_available(&self, required: Decimal) -> bool {
        self.balance >= required
    }
}

/// Immutable wallet ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionKind,
    /// Signed effect on the wallet balance
    pub balance_effect: Decimal,
    pub amount: Decimal,
    pub description: String,
    pub split_event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn payment(user_id: Uuid, amount: Decimal, event: &SplitEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: TransactionKind::Payment,
            balance_effect: -amount,
            amount,
            description: format!("Payment for {}", event.name),
            split_event_id: Some(event.id),
            created_at: Utc::now(),
        }
    }

    pub fn deposit(user_id: Uuid, amount: Decimal, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: TransactionKind::Deposit,
            balance_effect: amount,
            amount,
            description,
            split_event_id: None,
            created_at: Utc::now(),
        }
    }
}

/// One outstanding obligation joined with its parent event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Obligation {
    pub user_id: Uuid,
    pub split_event_id: Uuid,
    pub event_name: String,
    pub amount: Decimal,
}

/// Requested share for one invitee. `amount` is only read for specified splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantShare {
    pub user_id: Uuid,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// Everything needed to open a split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSplit {
    pub name: String,
    pub total_amount: Decimal,
    pub split_type: SplitType,
    pub creator_id: Uuid,
    /// Invitees, creator excluded
    pub participants: Vec<ParticipantShare>,
    /// Creator's declared share, required for specified splits
    #[serde(default)]
    pub creator_share: Option<Decimal>,
    #[serde(default)]
    pub receipt_ref: Option<String>,
}

/// Event together with its participant rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitDetails {
    pub event: SplitEvent,
    pub participants: Vec<Participant>,
}

impl SplitDetails {
    pub fn creator(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_creator)
    }

    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }
}

/// Outcome of a settled share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub split_event_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub transaction_id: Uuid,
    pub event_status: SplitStatus,
    pub remaining_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_completes_only_when_all_paid() {
        use ParticipantStatus::*;

        assert_eq!(
            SplitStatus::evaluate(SplitStatus::InProgress, &[Paid, Paid, Pending]),
            SplitStatus::InProgress
        );
        assert_eq!(
            SplitStatus::evaluate(SplitStatus::InProgress, &[Paid, Paid, Paid]),
            SplitStatus::Completed
        );
        assert_eq!(
            SplitStatus::evaluate(SplitStatus::InProgress, &[Paid, Declined, Pending]),
            SplitStatus::BlockedOnDecline
        );
    }

    #[test]
    fn test_share_actions() {
        use ParticipantStatus::*;

        assert_eq!(ShareAction::Accept.apply(Pending), Ok(Some(Accepted)));
        assert_eq!(ShareAction::Accept.apply(Accepted), Ok(None));
        assert_eq!(ShareAction::Decline.apply(Accepted), Ok(Some(Declined)));
        assert_eq!(
            ShareAction::Decline.apply(Paid),
            Err(LedgerError::AlreadySettled { status: Paid })
        );
        assert_eq!(
            ShareAction::Accept.apply(Declined),
            Err(LedgerError::AlreadySettled { status: Declined })
        );
    }

    #[test]
    fn test_completed_is_terminal() {
        assert_eq!(
            SplitStatus::evaluate(SplitStatus::Completed, &[ParticipantStatus::Pending]),
            SplitStatus::Completed
        );
    }

    #[test]
    fn test_paid_and_declined_shares_are_not_payable() {
        let mut participant = Participant {
            id: Uuid::new_v4(),
            split_event_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: Decimal::new(3000, 2),
            status: ParticipantStatus::Accepted,
            is_creator: false,
            created_at: Utc::now(),
            paid_at: None,
        };
        assert!(participant.ensure_payable().is_ok());

        participant.status = ParticipantStatus::Declined;
        assert_eq!(
            participant.ensure_payable(),
            Err(LedgerError::AlreadySettled {
                status: ParticipantStatus::Declined
            })
        );
    }
}
