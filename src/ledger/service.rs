use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::*;
use super::split::{allocate, from_cents, to_cents};
use super::store::LedgerStore;
use crate::error::{AppError, AppResult, LedgerError};
use crate::notifications::models::{Actor, NewNotification, NotificationKind};
use crate::notifications::NotificationDispatcher;

/// Split and wallet operations.
///
/// Validation happens before anything is written; the store applies each
/// mutation atomically. Notifications go out after the write and their
/// failure never undoes it.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub async fn create_split(&self, request: NewSplit) -> AppResult<SplitDetails> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Split name cannot be empty".to_string()));
        }

        let shares = allocate(&request)?;
        let now = Utc::now();

        let event = SplitEvent {
            id: Uuid::new_v4(),
            name,
            total_amount: request.total_amount,
            split_type: request.split_type,
            creator_id: request.creator_id,
            receipt_ref: request.receipt_ref.clone(),
            status: SplitStatus::InProgress,
            created_at: now,
        };

        let participants: Vec<Participant> = shares
            .into_iter()
            .map(|share| Participant {
                id: Uuid::new_v4(),
                split_event_id: event.id,
                user_id: share.user_id,
                amount: share.amount,
                // the creator funded the pot up front
                status: if share.is_creator {
                    ParticipantStatus::Paid
                } else {
                    ParticipantStatus::Pending
                },
                is_creator: share.is_creator,
                created_at: now,
                paid_at: share.is_creator.then_some(now),
            })
            .collect();

        self.store.insert_split(&event, &participants).await?;

        info!(
            "🧾 Split {} created by {}: {} ({:?}) across {} participants",
            event.id,
            event.creator_id,
            event.total_amount,
            event.split_type,
            participants.len()
        );

        let invites = participants.iter().filter(|p| !p.is_creator).map(|p| {
            let notification = NewNotification::new(
                p.user_id,
                NotificationKind::SplitInvite,
                "New Split Request",
                format!("You've been added to \"{}\". Your share is ${}.", event.name, p.amount),
            )
            .with_split_event(event.id)
            .with_metadata(serde_json::json!({
                "amount": p.amount.to_string(),
                "creator_id": event.creator_id,
                "split_type": event.split_type,
            }));
            self.notify(Actor::User(event.creator_id), notification)
        });
        join_all(invites).await;

        Ok(SplitDetails {
            event,
            participants,
        })
    }

    pub async fn pay_share(&self, event_id: Uuid, user_id: Uuid) -> AppResult<PaymentReceipt> {
        let event = self
            .store
            .get_split(event_id)
            .await?
            .ok_or(LedgerError::SplitNotFound(event_id))?;

        let participant = self
            .store
            .get_participant(event_id, user_id)
            .await?
            .ok_or(LedgerError::ParticipantNotFound { event_id, user_id })?;
        participant.ensure_payable()?;

        let wallet = self.wallet(user_id).await?;
        if !wallet.has_available(participant.amount) {
            return Err(LedgerError::InsufficientFunds {
                required: participant.amount,
                available: wallet.balance,
            }
            .into());
        }

        let receipt = self.store.settle_share(event_id, user_id).await?;

        info!(
            "💸 {} paid {} for split {} (event now {})",
            user_id, receipt.amount, event_id, receipt.event_status
        );

        let message = if receipt.event_status == SplitStatus::Completed {
            format!(
                "A participant paid ${} for \"{}\". Everyone has paid!",
                receipt.amount, event.name
            )
        } else {
            format!("A participant paid ${} for \"{}\".", receipt.amount, event.name)
        };
        let notification = NewNotification::new(
            event.creator_id,
            NotificationKind::SplitPaid,
            "Payment Received",
            message,
        )
        .with_split_event(event_id)
        .with_metadata(serde_json::json!({
            "payer_id": user_id,
            "amount": receipt.amount.to_string(),
            "event_status": receipt.event_status,
        }));
        self.notify(Actor::User(user_id), notification).await;

        Ok(receipt)
    }

    pub async fn accept_share(&self, event_id: Uuid, user_id: Uuid) -> AppResult<SplitStatus> {
        self.update_share(event_id, user_id, ShareAction::Accept).await
    }

    pub async fn decline_share(&self, event_id: Uuid, user_id: Uuid) -> AppResult<SplitStatus> {
        self.update_share(event_id, user_id, ShareAction::Decline).await
    }

    async fn update_share(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        action: ShareAction,
    ) -> AppResult<SplitStatus> {
        let event = self
            .store
            .get_split(event_id)
            .await?
            .ok_or(LedgerError::SplitNotFound(event_id))?;
        let participant = self
            .store
            .get_participant(event_id, user_id)
            .await?
            .ok_or(LedgerError::ParticipantNotFound { event_id, user_id })?;

        let changed = action.apply(participant.status)?.is_some();
        let status = self.store.update_share(event_id, user_id, action).await?;

        if !changed {
            return Ok(status);
        }

        info!(
            "✋ {} set share in split {} to {} (event now {})",
            user_id,
            event_id,
            action.target(),
            status
        );

        let (kind, title, message) = match action {
            ShareAction::Accept => (
                NotificationKind::SplitAccepted,
                "Split Accepted",
                format!("A participant accepted their share of \"{}\".", event.name),
            ),
            ShareAction::Decline => (
                NotificationKind::SplitDeclined,
                "Split Declined",
                format!(
                    "A participant declined their ${} share of \"{}\".",
                    participant.amount, event.name
                ),
            ),
        };
        let notification = NewNotification::new(event.creator_id, kind, title, message)
            .with_split_event(event_id)
            .with_metadata(serde_json::json!({
                "participant_id": user_id,
                "event_status": status,
            }));
        self.notify(Actor::User(user_id), notification).await;

        Ok(status)
    }

    pub async fn deposit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: Option<String>,
    ) -> AppResult<Wallet> {
        if to_cents(amount).map_or(true, |cents| cents <= 0) {
            return Err(LedgerError::InvalidAmount(format!(
                "deposit must be a positive amount up to {} with at most {} decimals, got {}",
                from_cents(MAX_AMOUNT_CENTS),
                MONEY_SCALE,
                amount
            ))
            .into());
        }

        let entry = WalletTransaction::deposit(
            user_id,
            amount,
            description.unwrap_or_else(|| "Wallet top-up".to_string()),
        );
        let wallet = self.store.record_deposit(&entry).await?;

        info!("🏦 Deposited {} into wallet of {} (balance {})", amount, user_id, wallet.balance);
        Ok(wallet)
    }

    pub async fn get_split(&self, event_id: Uuid) -> AppResult<SplitDetails> {
        let event = self
            .store
            .get_split(event_id)
            .await?
            .ok_or(LedgerError::SplitNotFound(event_id))?;
        let participants = self.store.get_participants(event_id).await?;

        Ok(SplitDetails {
            event,
            participants,
        })
    }

    /// Wallet for a user; users who never funded one get an empty wallet
    pub async fn wallet(&self, user_id: Uuid) -> AppResult<Wallet> {
        Ok(self
            .store
            .get_wallet(user_id)
            .await?
            .unwrap_or_else(|| Wallet::empty(user_id)))
    }

    pub async fn transactions(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<WalletTransaction>> {
        self.store.list_transactions(user_id, limit).await
    }

    async fn notify(&self, actor: Actor, notification: NewNotification) {
        let recipient = notification.user_id;
        let kind = notification.kind;
        let result = self.dispatcher.deliver(actor, notification).await;
        if !result.succeeded {
            warn!(
                "Notification {} for {} dropped after {} tier ({:?})",
                kind, recipient, result.tier, result.error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedgerStore;
    use crate::notifications::dispatcher::tests::SpyStrategy;
    use crate::notifications::memory::MemoryNotificationStore;
    use crate::notifications::models::{DeliveryErrorKind, DeliveryTier};
    use crate::notifications::tiers::{DirectInsertTier, RpcTier};
    use crate::notifications::DeliveryStrategy;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        ledger: Ledger,
        store: Arc<MemoryLedgerStore>,
        notifications: Arc<MemoryNotificationStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        let notifications = Arc::new(MemoryNotificationStore::new());
        let dispatcher = NotificationDispatcher::new(
            vec![
                Arc::new(RpcTier::new(notifications.clone())),
                Arc::new(DirectInsertTier::new(notifications.clone())),
            ],
            Duration::from_secs(1),
        );
        Fixture {
            ledger: Ledger::new(store.clone(), Arc::new(dispatcher)),
            store,
            notifications,
        }
    }

    fn equal_split(creator: Uuid, invitees: &[Uuid], total: Decimal) -> NewSplit {
        NewSplit {
            name: "Dinner".to_string(),
            total_amount: total,
            split_type: SplitType::Equal,
            creator_id: creator,
            participants: invitees
                .iter()
                .map(|id| ParticipantShare {
                    user_id: *id,
                    amount: None,
                })
                .collect(),
            creator_share: None,
            receipt_ref: None,
        }
    }

    #[tokio::test]
    async fn test_equal_split_end_to_end() {
        let f = fixture();
        let (creator, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        f.ledger.deposit(a, dec!(50), None).await.unwrap();
        f.ledger.deposit(b, dec!(30), None).await.unwrap();

        let split = f
            .ledger
            .create_split(equal_split(creator, &[a, b], dec!(90.00)))
            .await
            .unwrap();
        assert!(split.participants.iter().all(|p| p.amount == dec!(30.00)));
        assert_eq!(split.event.status, SplitStatus::InProgress);

        let receipt = f.ledger.pay_share(split.event.id, a).await.unwrap();
        assert_eq!(receipt.event_status, SplitStatus::InProgress);
        assert_eq!(receipt.remaining_balance, dec!(20.00));
        let details = f.ledger.get_split(split.event.id).await.unwrap();
        assert_eq!(details.participant(a).unwrap().status, ParticipantStatus::Paid);

        let receipt = f.ledger.pay_share(split.event.id, b).await.unwrap();
        assert_eq!(receipt.event_status, SplitStatus::Completed);
        assert_eq!(f.ledger.wallet(b).await.unwrap().balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_specified_split_end_to_end() {
        let f = fixture();
        let (creator, other) = (Uuid::new_v4(), Uuid::new_v4());
        let mut request = equal_split(creator, &[other], dec!(100.00));
        request.split_type = SplitType::Specified;
        request.creator_share = Some(dec!(40.00));
        request.receipt_ref = Some("receipts/lunch.jpg".to_string());

        let split = f.ledger.create_split(request).await.unwrap();
        assert_eq!(split.participant(other).unwrap().amount, dec!(60.00));
        assert_eq!(split.creator().unwrap().amount, dec!(40.00));
    }

    #[tokio::test]
    async fn test_event_completes_only_after_last_payment() {
        let f = fixture();
        let creator = Uuid::new_v4();
        let payers: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for payer in &payers {
            f.ledger.deposit(*payer, dec!(100), None).await.unwrap();
        }
        let split = f
            .ledger
            .create_split(equal_split(creator, &payers, dec!(40.00)))
            .await
            .unwrap();

        for payer in &payers[..2] {
            let receipt = f.ledger.pay_share(split.event.id, *payer).await.unwrap();
            assert_eq!(receipt.event_status, SplitStatus::InProgress);
        }
        let receipt = f.ledger.pay_share(split.event.id, payers[2]).await.unwrap();
        assert_eq!(receipt.event_status, SplitStatus::Completed);
    }

    #[tokio::test]
    async fn test_duplicate_payment_does_not_double_debit() {
        let f = fixture();
        let (creator, payer) = (Uuid::new_v4(), Uuid::new_v4());
        f.ledger.deposit(payer, dec!(100), None).await.unwrap();
        let split = f
            .ledger
            .create_split(equal_split(creator, &[payer], dec!(50.00)))
            .await
            .unwrap();

        f.ledger.pay_share(split.event.id, payer).await.unwrap();
        let err = f.ledger.pay_share(split.event.id, payer).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Ledger(LedgerError::AlreadySettled {
                status: ParticipantStatus::Paid
            })
        ));
        assert_eq!(f.ledger.wallet(payer).await.unwrap().balance, dec!(75.00));
        let payments = f.ledger.transactions(payer, 10).await.unwrap();
        assert_eq!(
            payments
                .iter()
                .filter(|t| t.kind == TransactionKind::Payment)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_submissions_settle_once() {
        let f = fixture();
        let (creator, payer) = (Uuid::new_v4(), Uuid::new_v4());
        f.ledger.deposit(payer, dec!(100), None).await.unwrap();
        let split = f
            .ledger
            .create_split(equal_split(creator, &[payer], dec!(50.00)))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            f.store.settle_share(split.event.id, payer),
            f.store.settle_share(split.event.id, payer),
        );
        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(f.ledger.wallet(payer).await.unwrap().balance, dec!(75.00));
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_state_untouched() {
        let f = fixture();
        let (creator, payer) = (Uuid::new_v4(), Uuid::new_v4());
        f.ledger.deposit(payer, dec!(10), None).await.unwrap();
        let split = f
            .ledger
            .create_split(equal_split(creator, &[payer], dec!(50.00)))
            .await
            .unwrap();

        let err = f.ledger.pay_share(split.event.id, payer).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Ledger(LedgerError::InsufficientFunds { .. })
        ));

        assert_eq!(f.ledger.wallet(payer).await.unwrap().balance, dec!(10));
        let details = f.ledger.get_split(split.event.id).await.unwrap();
        assert_eq!(details.participant(payer).unwrap().status, ParticipantStatus::Pending);
        assert_eq!(f.ledger.transactions(payer, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_participant() {
        let f = fixture();
        let split = f
            .ledger
            .create_split(equal_split(Uuid::new_v4(), &[Uuid::new_v4()], dec!(20)))
            .await
            .unwrap();

        let err = f
            .ledger
            .pay_share(split.event.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Ledger(LedgerError::ParticipantNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_decline_blocks_event_without_wallet_effect() {
        let f = fixture();
        let (creator, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        f.ledger.deposit(a, dec!(100), None).await.unwrap();
        let split = f
            .ledger
            .create_split(equal_split(creator, &[a, b], dec!(30)))
            .await
            .unwrap();

        let status = f.ledger.decline_share(split.event.id, b).await.unwrap();
        assert_eq!(status, SplitStatus::BlockedOnDecline);

        // remaining participants can still pay, the event stays blocked
        let receipt = f.ledger.pay_share(split.event.id, a).await.unwrap();
        assert_eq!(receipt.event_status, SplitStatus::BlockedOnDecline);

        let err = f.ledger.pay_share(split.event.id, b).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Ledger(LedgerError::AlreadySettled {
                status: ParticipantStatus::Declined
            })
        ));
        assert!(f.ledger.transactions(b, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accept_is_idempotent_and_payable() {
        let f = fixture();
        let (creator, a) = (Uuid::new_v4(), Uuid::new_v4());
        f.ledger.deposit(a, dec!(20), None).await.unwrap();
        let split = f
            .ledger
            .create_split(equal_split(creator, &[a], dec!(20)))
            .await
            .unwrap();

        f.ledger.accept_share(split.event.id, a).await.unwrap();
        f.ledger.accept_share(split.event.id, a).await.unwrap();
        let accepted = f
            .notifications
            .all()
            .await
            .into_iter()
            .filter(|n| n.kind == NotificationKind::SplitAccepted)
            .count();
        assert_eq!(accepted, 1);

        let receipt = f.ledger.pay_share(split.event.id, a).await.unwrap();
        assert_eq!(receipt.event_status, SplitStatus::Completed);
    }

    #[tokio::test]
    async fn test_invites_and_paid_notifications() {
        let f = fixture();
        let (creator, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        f.ledger.deposit(a, dec!(100), None).await.unwrap();
        let split = f
            .ledger
            .create_split(equal_split(creator, &[a, b], dec!(90)))
            .await
            .unwrap();
        f.ledger.pay_share(split.event.id, a).await.unwrap();

        let all = f.notifications.all().await;
        let invited: Vec<Uuid> = all
            .iter()
            .filter(|n| n.kind == NotificationKind::SplitInvite)
            .map(|n| n.user_id)
            .collect();
        assert_eq!(invited.len(), 2);
        assert!(invited.contains(&a) && invited.contains(&b));
        assert!(!invited.contains(&creator));

        let paid: Vec<_> = all
            .iter()
            .filter(|n| n.kind == NotificationKind::SplitPaid)
            .collect();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].user_id, creator);
        assert_eq!(paid[0].split_event_id, Some(split.event.id));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_undo_payment() {
        let store = Arc::new(MemoryLedgerStore::new());
        let failing: Vec<Arc<dyn DeliveryStrategy>> = [
            (DeliveryTier::Primary, DeliveryErrorKind::Unreachable),
            (DeliveryTier::Secondary, DeliveryErrorKind::BadResponse),
            (DeliveryTier::Tertiary, DeliveryErrorKind::Unauthorized),
        ]
        .into_iter()
        .map(|(tier, kind)| SpyStrategy::failing(tier, kind) as Arc<dyn DeliveryStrategy>)
        .collect();
        let ledger = Ledger::new(
            store.clone(),
            Arc::new(NotificationDispatcher::new(failing, Duration::from_secs(1))),
        );
        let (creator, payer) = (Uuid::new_v4(), Uuid::new_v4());
        ledger.deposit(payer, dec!(25), None).await.unwrap();

        let split = ledger
            .create_split(equal_split(creator, &[payer], dec!(50)))
            .await
            .unwrap();
        let receipt = ledger.pay_share(split.event.id, payer).await.unwrap();

        assert_eq!(receipt.event_status, SplitStatus::Completed);
        assert_eq!(ledger.wallet(payer).await.unwrap().balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_rejects_bad_deposits() {
        let f = fixture();
        for amount in [dec!(0), dec!(-1), dec!(1.001), dec!(10000000000.00)] {
            let err = f.ledger.deposit(Uuid::new_v4(), amount, None).await.unwrap_err();
            assert!(matches!(err, AppError::Ledger(LedgerError::InvalidAmount(_))));
        }
    }

    #[derive(Debug, Clone)]
    enum Op {
        Deposit(usize, i64),
        Pay(usize, usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 1i64..5_000).prop_map(|(user, cents)| Op::Deposit(user, cents)),
            (0usize..3, 0usize..4).prop_map(|(user, split)| Op::Pay(user, split)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn balances_never_go_negative(
            totals in prop::collection::vec(300i64..20_000, 4),
            ops in prop::collection::vec(op_strategy(), 1..40),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let f = fixture();
                let creator = Uuid::new_v4();
                let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

                let mut splits = Vec::new();
                for total in &totals {
                    let split = f
                        .ledger
                        .create_split(equal_split(creator, &users, Decimal::new(*total, 2)))
                        .await
                        .unwrap();
                    splits.push(split.event.id);
                }

                for op in &ops {
                    match op {
                        Op::Deposit(user, cents) => {
                            f.ledger.deposit(users[*user], Decimal::new(*cents, 2), None).await.unwrap();
                        }
                        Op::Pay(user, split) => {
                            let _ = f.ledger.pay_share(splits[*split], users[*user]).await;
                        }
                    }

                    for user in &users {
                        let wallet = f.ledger.wallet(*user).await.unwrap();
                        assert!(wallet.balance >= Decimal::ZERO);

                        // balance equals the sum of its transaction effects
                        let effects: Decimal = f
                            .ledger
                            .transactions(*user, i64::MAX)
                            .await
                            .unwrap()
                            .iter()
                            .map(|t| t.balance_effect)
                            .sum();
                        assert_eq!(effects, wallet.balance);
                    }
                }
            });
        }
    }
}
