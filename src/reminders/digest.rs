use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ledger::models::Obligation;
use crate::notifications::models::{NewNotification, NotificationKind};

/// Event names listed before the rest are summarized as "+N more"
const NAMES_SHOWN: usize = 2;

/// Everything one user owes, folded into a single reminder
#[derive(Debug, Clone, PartialEq)]
pub struct UserDigest {
    pub user_id: Uuid,
    pub total: Decimal,
    pub count: usize,
    /// Distinct, in first-seen order
    pub event_names: Vec<String>,
}

impl UserDigest {
    pub fn to_notification(&self) -> NewNotification {
        let message = if self.count == 1 {
            format!(
                "You have a pending payment of ${} for \"{}\"",
                self.total,
                self.event_names.first().map(String::as_str).unwrap_or_default()
            )
        } else {
            format!(
                "You have {} pending payments totaling ${} ({})",
                self.count,
                self.total,
                summarize_names(&self.event_names)
            )
        };

        NewNotification::new(
            self.user_id,
            NotificationKind::PaymentReminder,
            "Payment Reminder",
            message,
        )
        .with_metadata(serde_json::json!({
            "total_pending": self.total.to_string(),
            "event_count": self.count,
            "event_names": self.event_names,
        }))
    }
}

pub fn group_obligations(obligations: &[Obligation]) -> Vec<UserDigest> {
    let mut by_user: BTreeMap<Uuid, UserDigest> = BTreeMap::new();

    for obligation in obligations {
        let digest = by_user
            .entry(obligation.user_id)
            .or_insert_with(|| UserDigest {
                user_id: obligation.user_id,
                total: Decimal::ZERO,
                count: 0,
                event_names: Vec::new(),
            });
        digest.total += obligation.amount;
        digest.count += 1;
        if !digest.event_names.contains(&obligation.event_name) {
            digest.event_names.push(obligation.event_name.clone());
        }
    }

    by_user.into_values().collect()
}

/// "A, B +N more"
pub fn summarize_names(names: &[String]) -> String {
    let shown = names
        .iter()
        .take(NAMES_SHOWN)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    if names.len() > NAMES_SHOWN {
        format!("{} +{} more", shown, names.len() - NAMES_SHOWN)
    } else {
        shown
    }
}
