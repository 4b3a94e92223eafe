use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::*;
use super::store::LedgerStore;
use crate::error::{AppError, AppResult, LedgerError};

#[derive(Default)]
struct LedgerState {
    events: HashMap<Uuid, SplitEvent>,
    participants: HashMap<Uuid, Vec<Participant>>,
    wallets: HashMap<Uuid, Wallet>,
    transactions: Vec<WalletTransaction>,
}

/// In-process ledger store.
///
/// Used when no database is configured and by the tests. A single write lock
/// covers each mutating call, which gives the same all-or-nothing behaviour
/// as a database transaction.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_split(&self, event: &SplitEvent, participants: &[Participant]) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.events.contains_key(&event.id) {
            return Err(AppError::Internal(format!("Split {} already exists", event.id)));
        }
        if participants.iter().any(|p| p.split_event_id != event.id) {
            return Err(AppError::Internal(
                "Participant rows must reference the new split".to_string(),
            ));
        }

        state.events.insert(event.id, event.clone());
        state.participants.insert(event.id, participants.to_vec());
        Ok(())
    }

    async fn get_split(&self, event_id: Uuid) -> AppResult<Option<SplitEvent>> {
        Ok(self.state.read().await.events.get(&event_id).cloned())
    }

    async fn get_participants(&self, event_id: Uuid) -> AppResult<Vec<Participant>> {
        Ok(self
            .state
            .read()
            .await
            .participants
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_participant(&self, event_id: Uuid, user_id: Uuid) -> AppResult<Option<Participant>> {
        let state = self.state.read().await;
        Ok(state
            .participants
            .get(&event_id)
            .and_then(|rows| rows.iter().find(|p| p.user_id == user_id))
            .cloned())
    }

    async fn get_wallet(&self, user_id: Uuid) -> AppResult<Option<Wallet>> {
        Ok(self.state.read().await.wallets.get(&user_id).cloned())
    }

    async fn settle_share(&self, event_id: Uuid, user_id: Uuid) -> AppResult<PaymentReceipt> {
        let mut guard = self.state.write().await;
        let LedgerState {
            events,
            participants,
            wallets,
            transactions,
        } = &mut *guard;

        let event = events
            .get_mut(&event_id)
            .ok_or(LedgerError::SplitNotFound(event_id))?;
        let rows = participants
            .get_mut(&event_id)
            .ok_or(LedgerError::SplitNotFound(event_id))?;
        let idx = rows
            .iter()
            .position(|p| p.user_id == user_id)
            .ok_or(LedgerError::ParticipantNotFound { event_id, user_id })?;

        rows[idx].ensure_payable()?;
        let amount = rows[idx].amount;

        let available = wallets.get(&user_id).map_or(Decimal::ZERO, |w| w.balance);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available,
            }
            .into());
        }

        // all checks passed, mutate
        let wallet = wallets
            .entry(user_id)
            .or_insert_with(|| Wallet::empty(user_id));
        wallet.balance -= amount;
        wallet.updated_at = Utc::now();
        let remaining_balance = wallet.balance;

        let entry = WalletTransaction::payment(user_id, amount, event);
        let transaction_id = entry.id;
        transactions.push(entry);

        rows[idx].status = ParticipantStatus::Paid;
        rows[idx].paid_at = Some(Utc::now());

        let statuses: Vec<ParticipantStatus> = rows.iter().map(|p| p.status).collect();
        event.status = SplitStatus::evaluate(event.status, &statuses);

        Ok(PaymentReceipt {
            split_event_id: event_id,
            user_id,
            amount,
            transaction_id,
            event_status: event.status,
            remaining_balance,
        })
    }

    async fn update_share(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        action: ShareAction,
    ) -> AppResult<SplitStatus> {
        let mut guard = self.state.write().await;
        let LedgerState {
            events,
            participants,
            ..
        } = &mut *guard;

        let event = events
            .get_mut(&event_id)
            .ok_or(LedgerError::SplitNotFound(event_id))?;
        let rows = participants
            .get_mut(&event_id)
            .ok_or(LedgerError::SplitNotFound(event_id))?;
        let participant = rows
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(LedgerError::ParticipantNotFound { event_id, user_id })?;

        if let Some(next) = action.apply(participant.status)? {
            participant.status = next;
        }

        let statuses: Vec<ParticipantStatus> = rows.iter().map(|p| p.status).collect();
        event.status = SplitStatus::evaluate(event.status, &statuses);
        Ok(event.status)
    }

    async fn record_deposit(&self, entry: &WalletTransaction) -> AppResult<Wallet> {
        let mut state = self.state.write().await;
        let wallet = state
            .wallets
            .entry(entry.user_id)
            .or_insert_with(|| Wallet::empty(entry.user_id));
        wallet.balance += entry.balance_effect;
        wallet.updated_at = Utc::now();
        let wallet = wallet.clone();

        state.transactions.push(entry.clone());
        Ok(wallet)
    }

    async fn list_transactions(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<WalletTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn outstanding_obligations(&self) -> AppResult<Vec<Obligation>> {
        let state = self.state.read().await;

        let mut events: Vec<&SplitEvent> = state.events.values().collect();
        events.sort_by_key(|e| e.created_at);

        let obligations = events
            .into_iter()
            .flat_map(|event| {
                state
                    .participants
                    .get(&event.id)
                    .into_iter()
                    .flatten()
                    .filter(|p| !p.is_creator && p.status.is_outstanding())
                    .map(move |p| Obligation {
                        user_id: p.user_id,
                        split_event_id: event.id,
                        event_name: event.name.clone(),
                        amount: p.amount,
                    })
            })
            .collect();

        Ok(obligations)
    }
}
