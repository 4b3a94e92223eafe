use async_trait::async_trait;
use uuid::Uuid;

use super::models::*;
use crate::error::AppResult;

/// Persistence seam for the ledger.
///
/// Every mutating method is one atomic unit: it either applies all of its
/// row changes or none of them. Implementations re-check preconditions inside
/// that unit so concurrent callers cannot double-debit a wallet.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert an event and all of its participant rows together
    async fn insert_split(&self, event: &SplitEvent, participants: &[Participant]) -> AppResult<()>;

    async fn get_split(&self, event_id: Uuid) -> AppResult<Option<SplitEvent>>;

    async fn get_participants(&self, event_id: Uuid) -> AppResult<Vec<Participant>>;

    async fn get_participant(&self, event_id: Uuid, user_id: Uuid) -> AppResult<Option<Participant>>;

    async fn get_wallet(&self, user_id: Uuid) -> AppResult<Option<Wallet>>;

    /// Debit the payer, append the payment transaction, mark the share paid
    /// and re-evaluate the event status
    async fn settle_share(&self, event_id: Uuid, user_id: Uuid) -> AppResult<PaymentReceipt>;

    /// Apply an accept/decline and re-evaluate the event status
    async fn update_share(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        action: ShareAction,
    ) -> AppResult<SplitStatus>;

    /// Credit a wallet (created on first use) together with its transaction row
    async fn record_deposit(&self, entry: &WalletTransaction) -> AppResult<Wallet>;

    async fn list_transactions(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<WalletTransaction>>;

    /// Non-creator pending/accepted shares across all events
    async fn outstanding_obligations(&self) -> AppResult<Vec<Obligation>>;
}
