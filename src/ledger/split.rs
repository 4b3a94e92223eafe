// Share allocation for new split events.
//
// Amounts are handled in integer cents so the participant amounts always sum
// to the event total exactly.
//
// Rounding policy:
// - equal: every participant owes floor(total / n); leftover cents go to the creator
// - specified: invitees share total - creator_share; leftover cents go one each
//   to the first invitees in request order

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

use super::models::{NewSplit, SplitType, MAX_AMOUNT_CENTS, MONEY_SCALE};
use crate::error::LedgerError;

/// Amount assigned to one participant of a new split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareAllocation {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub is_creator: bool,
}

/// Validate a split request and compute every participant's share
pub fn allocate(split: &NewSplit) -> Result<Vec<ShareAllocation>, LedgerError> {
    let total_cents = to_cents(split.total_amount)
        .filter(|cents| *cents > 0)
        .ok_or_else(|| {
            LedgerError::InvalidAmount(format!(
                "total must be a positive amount up to {} with at most {} decimals, got {}",
                from_cents(MAX_AMOUNT_CENTS),
                MONEY_SCALE,
                split.total_amount
            ))
        })?;

    validate_invitees(split)?;

    match split.split_type {
        SplitType::Equal => allocate_equal(split, total_cents),
        SplitType::Specified => allocate_specified(split, total_cents),
    }
}

fn validate_invitees(split: &NewSplit) -> Result<(), LedgerError> {
    if split.participants.is_empty() {
        return Err(LedgerError::InvalidParticipants(
            "a split needs at least one invitee".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(split.participants.len());
    for share in &split.participants {
        if share.user_id == split.creator_id {
            return Err(LedgerError::InvalidParticipants(
                "the creator is added automatically and cannot be invited".to_string(),
            ));
        }
        if !seen.insert(share.user_id) {
            return Err(LedgerError::InvalidParticipants(format!(
                "user {} is invited more than once",
                share.user_id
            )));
        }
    }

    Ok(())
}

fn allocate_equal(split: &NewSplit, total_cents: i64) -> Result<Vec<ShareAllocation>, LedgerError> {
    let count = split.participants.len() as i64 + 1;
    let base = total_cents / count;
    let leftover = total_cents % count;

    if base == 0 {
        return Err(LedgerError::InvalidAmount(format!(
            "{} cannot be split between {} participants",
            split.total_amount, count
        )));
    }

    let mut shares = Vec::with_capacity(count as usize);
    shares.push(ShareAllocation {
        user_id: split.creator_id,
        amount: from_cents(base + leftover),
        is_creator: true,
    });
    shares.extend(split.participants.iter().map(|p| ShareAllocation {
        user_id: p.user_id,
        amount: from_cents(base),
        is_creator: false,
    }));

    Ok(shares)
}

fn allocate_specified(
    split: &NewSplit,
    total_cents: i64,
) -> Result<Vec<ShareAllocation>, LedgerError> {
    if split
        .receipt_ref
        .as_deref()
        .map_or(true, |r| r.trim().is_empty())
    {
        return Err(LedgerError::MissingReceipt);
    }

    let creator_share = split
        .creator_share
        .ok_or_else(|| LedgerError::InvalidShare("creator share is required".to_string()))?;
    let creator_cents = to_cents(creator_share)
        .filter(|cents| *cents > 0 && *cents < total_cents)
        .ok_or_else(|| {
            LedgerError::InvalidShare(format!(
                "creator share {} must be between 0 and {}",
                creator_share, split.total_amount
            ))
        })?;

    let remainder = total_cents - creator_cents;
    let explicit: Vec<Option<Decimal>> = split.participants.iter().map(|p| p.amount).collect();
    let given = explicit.iter().filter(|a| a.is_some()).count();

    let invitee_cents: Vec<i64> = if given == explicit.len() {
        let mut cents = Vec::with_capacity(given);
        for amount in explicit.into_iter().flatten() {
            let value = to_cents(amount)
                .filter(|c| *c > 0 && *c <= remainder)
                .ok_or_else(|| {
                    LedgerError::InvalidShare(format!(
                        "invitee share {} must be between 0 and {}",
                        amount,
                        from_cents(remainder)
                    ))
                })?;
            cents.push(value);
        }
        let sum = cents
            .iter()
            .try_fold(0i64, |acc, c| acc.checked_add(*c))
            .filter(|sum| *sum == remainder);
        if sum.is_none() {
            return Err(LedgerError::InvalidShare(format!(
                "invitee shares must add up to the {} left after the creator share",
                from_cents(remainder)
            )));
        }
        cents
    } else if given == 0 {
        let count = split.participants.len() as i64;
        let base = remainder / count;
        let leftover = remainder % count;
        if base == 0 {
            return Err(LedgerError::InvalidShare(format!(
                "{} cannot be split between {} invitees",
                from_cents(remainder),
                count
            )));
        }
        (0..count)
            .map(|idx| if idx < leftover { base + 1 } else { base })
            .collect()
    } else {
        return Err(LedgerError::InvalidShare(
            "give an amount for every invitee or for none".to_string(),
        ));
    };

    let mut shares = Vec::with_capacity(invitee_cents.len() + 1);
    shares.push(ShareAllocation {
        user_id: split.creator_id,
        amount: from_cents(creator_cents),
        is_creator: true,
    });
    shares.extend(
        split
            .participants
            .iter()
            .zip(invitee_cents)
            .map(|(p, cents)| ShareAllocation {
                user_id: p.user_id,
                amount: from_cents(cents),
                is_creator: false,
            }),
    );

    Ok(shares)
}

/// Convert an amount to whole cents. `None` when it carries sub-cent precision
/// or does not fit the money columns.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    let cents = amount.checked_mul(Decimal::ONE_HUNDRED)?;
    if cents.fract() != Decimal::ZERO {
        return None;
    }
    cents
        .to_i64()
        .filter(|cents| cents.checked_abs().map_or(false, |abs| abs <= MAX_AMOUNT_CENTS))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, MONEY_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::ParticipantShare;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn invitees(count: usize) -> Vec<ParticipantShare> {
        (0..count)
            .map(|_| ParticipantShare {
                user_id: Uuid::new_v4(),
                amount: None,
            })
            .collect()
    }

    fn equal_split(total: Decimal, invitee_count: usize) -> NewSplit {
        NewSplit {
            name: "Dinner".to_string(),
            total_amount: total,
            split_type: SplitType::Equal,
            creator_id: Uuid::new_v4(),
            participants: invitees(invitee_count),
            creator_share: None,
            receipt_ref: None,
        }
    }

    #[test]
    fn test_equal_split_even_total() {
        let shares = allocate(&equal_split(dec!(90.00), 2)).unwrap();
        assert_eq!(shares.len(), 3);
        assert!(shares.iter().all(|s| s.amount == dec!(30.00)));
        assert_eq!(shares.iter().filter(|s| s.is_creator).count(), 1);
    }

    #[test]
    fn test_equal_split_leftover_goes_to_creator() {
        let shares = allocate(&equal_split(dec!(100.00), 2)).unwrap();
        let creator = shares.iter().find(|s| s.is_creator).unwrap();
        assert_eq!(creator.amount, dec!(33.34));
        assert!(shares
            .iter()
            .filter(|s| !s.is_creator)
            .all(|s| s.amount == dec!(33.33)));
    }

    #[test]
    fn test_specified_split_remainder_to_single_invitee() {
        let mut split = equal_split(dec!(100.00), 1);
        split.split_type = SplitType::Specified;
        split.creator_share = Some(dec!(40.00));
        split.receipt_ref = Some("receipts/abc.jpg".to_string());

        let shares = allocate(&split).unwrap();
        let other = shares.iter().find(|s| !s.is_creator).unwrap();
        assert_eq!(other.amount, dec!(60.00));
    }

    #[test]
    fn test_specified_split_requires_receipt() {
        let mut split = equal_split(dec!(100.00), 1);
        split.split_type = SplitType::Specified;
        split.creator_share = Some(dec!(40.00));

        assert_eq!(allocate(&split), Err(LedgerError::MissingReceipt));
    }

    #[test]
    fn test_specified_split_rejects_share_out_of_range() {
        let mut split = equal_split(dec!(100.00), 1);
        split.split_type = SplitType::Specified;
        split.receipt_ref = Some("r".to_string());

        for share in [dec!(0), dec!(100.00), dec!(120), dec!(-5)] {
            split.creator_share = Some(share);
            assert!(matches!(allocate(&split), Err(LedgerError::InvalidShare(_))));
        }
    }

    #[test]
    fn test_specified_split_explicit_amounts_must_cover_remainder() {
        let mut split = equal_split(dec!(100.00), 2);
        split.split_type = SplitType::Specified;
        split.receipt_ref = Some("r".to_string());
        split.creator_share = Some(dec!(40.00));
        split.participants[0].amount = Some(dec!(25.00));
        split.participants[1].amount = Some(dec!(35.00));
        assert!(allocate(&split).is_ok());

        split.participants[1].amount = Some(dec!(30.00));
        assert!(matches!(allocate(&split), Err(LedgerError::InvalidShare(_))));
    }

    #[test]
    fn test_specified_split_leftover_cents_go_to_first_invitees() {
        let mut split = equal_split(dec!(100.00), 2);
        split.split_type = SplitType::Specified;
        split.receipt_ref = Some("r".to_string());
        split.creator_share = Some(dec!(40.01));

        let shares = allocate(&split).unwrap();
        assert_eq!(shares[0].amount, dec!(40.01));
        assert_eq!(shares[1].user_id, split.participants[0].user_id);
        assert_eq!(shares[1].amount, dec!(30.00));
        assert_eq!(shares[2].user_id, split.participants[1].user_id);
        assert_eq!(shares[2].amount, dec!(29.99));
    }

    #[test]
    fn test_specified_split_rejects_oversized_invitee_amounts() {
        let mut split = equal_split(dec!(100.00), 2);
        split.split_type = SplitType::Specified;
        split.receipt_ref = Some("r".to_string());
        split.creator_share = Some(dec!(40.00));
        split.participants[0].amount = Some(dec!(90000000000000000));
        split.participants[1].amount = Some(dec!(90000000000000000));
        assert!(matches!(allocate(&split), Err(LedgerError::InvalidShare(_))));

        // would wrap an i64 cent sum back around to the remainder
        let mut split = equal_split(dec!(100.00), 3);
        split.split_type = SplitType::Specified;
        split.receipt_ref = Some("r".to_string());
        split.creator_share = Some(dec!(40.00));
        split.participants[0].amount = Some(dec!(92233720368547758.07));
        split.participants[1].amount = Some(dec!(92233720368547758.07));
        split.participants[2].amount = Some(dec!(60.02));
        assert!(matches!(allocate(&split), Err(LedgerError::InvalidShare(_))));
    }

    #[test]
    fn test_rejects_amounts_beyond_money_columns() {
        assert_eq!(to_cents(dec!(9999999999.99)), Some(MAX_AMOUNT_CENTS));
        assert_eq!(to_cents(dec!(10000000000.00)), None);
        assert!(matches!(
            allocate(&equal_split(dec!(10000000000.00), 1)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(allocate(&equal_split(dec!(9999999999.99), 1)).is_ok());
    }

    #[test]
    fn test_rejects_invalid_totals() {
        for total in [dec!(0), dec!(-10), dec!(10.005)] {
            assert!(matches!(
                allocate(&equal_split(total, 2)),
                Err(LedgerError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn test_rejects_creator_as_invitee_and_duplicates() {
        let mut split = equal_split(dec!(10), 1);
        split.participants[0].user_id = split.creator_id;
        assert!(matches!(
            allocate(&split),
            Err(LedgerError::InvalidParticipants(_))
        ));

        let mut split = equal_split(dec!(10), 2);
        split.participants[1].user_id = split.participants[0].user_id;
        assert!(matches!(
            allocate(&split),
            Err(LedgerError::InvalidParticipants(_))
        ));
    }

    proptest! {
        #[test]
        fn equal_shares_sum_to_total(
            total_cents in 1i64..=10_000_000,
            invitee_count in 1usize..=12,
        ) {
            let split = equal_split(from_cents(total_cents), invitee_count);
            if let Ok(shares) = allocate(&split) {
                let sum: Decimal = shares.iter().map(|s| s.amount).sum();
                prop_assert_eq!(sum, split.total_amount);
                prop_assert!(shares.iter().all(|s| s.amount > Decimal::ZERO));
                prop_assert_eq!(shares.len(), invitee_count + 1);
            } else {
                // only too-small totals are rejected
                prop_assert!(total_cents < invitee_count as i64 + 1);
            }
        }
    }
}
