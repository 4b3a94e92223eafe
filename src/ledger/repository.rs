use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::*;
use super::store::LedgerStore;
use crate::error::{AppError, AppResult, LedgerError};

const EVENT_COLUMNS: &str =
    "id, name, total_amount, split_type, creator_id, receipt_ref, status, created_at";
const PARTICIPANT_COLUMNS: &str =
    "id, split_event_id, user_id, amount, status, is_creator, created_at, paid_at";
const WALLET_COLUMNS: &str = "user_id, balance, bank_connected, updated_at";

/// Ledger repository - THE source of truth for splits and wallets
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin_tx(&self) -> AppResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    async fn insert_transaction(
        tx: &mut Transaction<'_, Postgres>,
        entry: &WalletTransaction,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (
                id, user_id, kind, balance_effect, amount, description, split_event_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.kind)
        .bind(entry.balance_effect)
        .bind(entry.amount)
        .bind(&entry.description)
        .bind(entry.split_event_id)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Lock the event row, recompute its status from the participant rows and
    /// persist it when it changed
    async fn refresh_event_status(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
    ) -> AppResult<SplitStatus> {
        let current = sqlx::query_scalar::<_, SplitStatus>(
            "SELECT status FROM split_events WHERE id = $1 FOR UPDATE",
        )
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(LedgerError::SplitNotFound(event_id))?;

        let statuses = sqlx::query_scalar::<_, ParticipantStatus>(
            "SELECT status FROM participants WHERE split_event_id = $1",
        )
        .bind(event_id)
        .fetch_all(&mut **tx)
        .await?;

        let next = SplitStatus::evaluate(current, &statuses);
        if next != current {
            sqlx::query("UPDATE split_events SET status = $2 WHERE id = $1")
                .bind(event_id)
                .bind(next)
                .execute(&mut **tx)
                .await?;
            info!("📌 Split {} moved {} → {}", event_id, current, next);
        }

        Ok(next)
    }

    async fn lock_participant(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Participant> {
        let participant = sqlx::query_as::<_, Participant>(&format!(
            "SELECT {} FROM participants WHERE split_event_id = $1 AND user_id = $2 FOR UPDATE",
            PARTICIPANT_COLUMNS
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(LedgerError::ParticipantNotFound { event_id, user_id })?;

        Ok(participant)
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn insert_split(&self, event: &SplitEvent, participants: &[Participant]) -> AppResult<()> {
        let mut tx = self.begin_tx().await?;

        sqlx::query(
            r#"
            INSERT INTO split_events (
                id, name, total_amount, split_type, creator_id, receipt_ref, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(event.total_amount)
        .bind(event.split_type)
        .bind(event.creator_id)
        .bind(&event.receipt_ref)
        .bind(event.status)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await?;

        for participant in participants {
            sqlx::query(
                r#"
                INSERT INTO participants (
                    id, split_event_id, user_id, amount, status, is_creator, created_at, paid_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(participant.id)
            .bind(participant.split_event_id)
            .bind(participant.user_id)
            .bind(participant.amount)
            .bind(participant.status)
            .bind(participant.is_creator)
            .bind(participant.created_at)
            .bind(participant.paid_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Split {} stored with {} participants", event.id, participants.len());
        Ok(())
    }

    async fn get_split(&self, event_id: Uuid) -> AppResult<Option<SplitEvent>> {
        let event = sqlx::query_as::<_, SplitEvent>(&format!(
            "SELECT {} FROM split_events WHERE id = $1",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn get_participants(&self, event_id: Uuid) -> AppResult<Vec<Participant>> {
        let rows = sqlx::query_as::<_, Participant>(&format!(
            "SELECT {} FROM participants WHERE split_event_id = $1 ORDER BY is_creator DESC, created_at ASC",
            PARTICIPANT_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_participant(&self, event_id: Uuid, user_id: Uuid) -> AppResult<Option<Participant>> {
        let row = sqlx::query_as::<_, Participant>(&format!(
            "SELECT {} FROM participants WHERE split_event_id = $1 AND user_id = $2",
            PARTICIPANT_COLUMNS
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_wallet(&self, user_id: Uuid) -> AppResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE user_id = $1",
            WALLET_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn settle_share(&self, event_id: Uuid, user_id: Uuid) -> AppResult<PaymentReceipt> {
        let mut tx = self.begin_tx().await?;

        let event = sqlx::query_as::<_, SplitEvent>(&format!(
            "SELECT {} FROM split_events WHERE id = $1",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::SplitNotFound(event_id))?;

        // Row lock serializes duplicate submissions for the same share
        let participant = Self::lock_participant(&mut tx, event_id, user_id).await?;
        participant.ensure_payable()?;

        let available = sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(Decimal::ZERO);

        if available < participant.amount {
            return Err(LedgerError::InsufficientFunds {
                required: participant.amount,
                available,
            }
            .into());
        }

        let remaining_balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE wallets
            SET balance = balance - $2, updated_at = NOW()
            WHERE user_id = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(participant.amount)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::InsufficientFunds {
            required: participant.amount,
            available,
        })?;

        let entry = WalletTransaction::payment(user_id, participant.amount, &event);
        Self::insert_transaction(&mut tx, &entry).await?;

        sqlx::query("UPDATE participants SET status = $2, paid_at = NOW() WHERE id = $1")
            .bind(participant.id)
            .bind(ParticipantStatus::Paid)
            .execute(&mut *tx)
            .await?;

        let event_status = Self::refresh_event_status(&mut tx, event_id).await?;

        tx.commit().await?;

        Ok(PaymentReceipt {
            split_event_id: event_id,
            user_id,
            amount: participant.amount,
            transaction_id: entry.id,
            event_status,
            remaining_balance,
        })
    }

    async fn update_share(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        action: ShareAction,
    ) -> AppResult<SplitStatus> {
        let mut tx = self.begin_tx().await?;

        let participant = Self::lock_participant(&mut tx, event_id, user_id).await?;
        if let Some(next) = action.apply(participant.status)? {
            sqlx::query("UPDATE participants SET status = $2 WHERE id = $1")
                .bind(participant.id)
                .bind(next)
                .execute(&mut *tx)
                .await?;
        }

        let event_status = Self::refresh_event_status(&mut tx, event_id).await?;
        tx.commit().await?;

        Ok(event_status)
    }

    async fn record_deposit(&self, entry: &WalletTransaction) -> AppResult<Wallet> {
        if entry.balance_effect <= Decimal::ZERO {
            return Err(AppError::InvalidInput(
                "Deposits must credit the wallet".to_string(),
            ));
        }

        let mut tx = self.begin_tx().await?;

        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            INSERT INTO wallets (user_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET balance = wallets.balance + EXCLUDED.balance, updated_at = NOW()
            RETURNING {}
            "#,
            WALLET_COLUMNS
        ))
        .bind(entry.user_id)
        .bind(entry.balance_effect)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_transaction(&mut tx, entry).await?;
        tx.commit().await?;

        Ok(wallet)
    }

    async fn list_transactions(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT id, user_id, kind, balance_effect, amount, description, split_event_id, created_at
            FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn outstanding_obligations(&self) -> AppResult<Vec<Obligation>> {
        let rows = sqlx::query_as::<_, Obligation>(
            r#"
            SELECT p.user_id, p.split_event_id, e.name AS event_name, p.amount
            FROM participants p
            JOIN split_events e ON e.id = p.split_event_id
            WHERE p.status IN ('pending', 'accepted') AND p.is_creator = FALSE
            ORDER BY e.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
