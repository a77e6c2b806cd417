use crate::error::SubmissionError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use diesel::Connection;
use droptally_db::models::{
    DbPointCredit, NewFeatureActivation, NewPointCredit, NewPointDebit, NewRecurringPointGrant,
};
use droptally_db::{PgConnection, db};
use log::{info, warn};
use serde::Serialize;
use serde_json::json;

pub const DEFAULT_EXPIRY_DAYS: i64 = 60;

/// One slice of a debit: which credit it drew from, and how much.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub credit_id: i64,
    pub amount: i64,
}

/// Plans how `need` points are drawn from the given credits. Consumption
/// order is soonest expiry first (never-expiring credits last), then
/// earliest earned_at, then id. Pure so the ordering is testable; callers
/// pass credits already row-locked.
pub fn plan_allocations(
    credits: &[DbPointCredit],
    need: i64,
) -> Result<Vec<Allocation>, SubmissionError> {
    if need <= 0 {
        return Err(SubmissionError::validation("required amount must be positive"));
    }

    let mut ordered: Vec<&DbPointCredit> = credits.iter().collect();
    ordered.sort_by(|a, b| {
        match (&a.expires_at, &b.expires_at) {
            (Some(ea), Some(eb)) => ea.cmp(eb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then(a.earned_at.cmp(&b.earned_at))
        .then(a.id.cmp(&b.id))
    });

    let mut allocations = Vec::new();
    let mut remaining = need;
    for credit in ordered {
        if credit.amount_remaining <= 0 {
            continue;
        }
        let take = credit.amount_remaining.min(remaining);
        allocations.push(Allocation {
            credit_id: credit.id,
            amount: take,
        });
        remaining -= take;
        if remaining == 0 {
            break;
        }
    }

    if remaining > 0 {
        return Err(SubmissionError::InsufficientPoints {
            required: need,
            available: need - remaining,
        });
    }
    Ok(allocations)
}

pub fn award_points_to_player(
    conn: &mut PgConnection,
    player_id: i32,
    amount: i64,
    source: &str,
    expires_in_days: Option<i64>,
) -> Result<i64, SubmissionError> {
    if amount <= 0 {
        return Err(SubmissionError::validation("amount must be positive"));
    }
    let now = Utc::now();
    let credit_id = db::insert_credit(
        conn,
        &NewPointCredit {
            player_id: Some(player_id),
            group_id: None,
            source,
            amount,
            amount_remaining: amount,
            earned_at: now.naive_utc(),
            expires_at: expires_in_days.map(|days| (now + Duration::days(days)).naive_utc()),
            status: "active",
        },
    )?;
    info!("Credited {amount} points to player {player_id}: {source}");
    Ok(credit_id)
}

pub fn award_points_to_group(
    conn: &mut PgConnection,
    group_id: i32,
    amount: i64,
    source: &str,
    expires_in_days: Option<i64>,
) -> Result<i64, SubmissionError> {
    if amount <= 0 {
        return Err(SubmissionError::validation("amount must be positive"));
    }
    let now = Utc::now();
    let credit_id = db::insert_credit(
        conn,
        &NewPointCredit {
            player_id: None,
            group_id: Some(group_id),
            source,
            amount,
            amount_remaining: amount,
            earned_at: now.naive_utc(),
            expires_at: expires_in_days.map(|days| (now + Duration::days(days)).naive_utc()),
            status: "active",
        },
    )?;
    Ok(credit_id)
}

#[derive(Debug, Clone)]
pub struct ActivationReceipt {
    pub activation_id: i64,
    pub debit_id: i64,
    pub allocations: Vec<Allocation>,
}

/// Spends a player's own credits to activate a feature for themselves. All
/// or nothing: insufficient points leaves no rows mutated.
pub fn activate_for_player(
    conn: &mut PgConnection,
    player_id: i32,
    feature_key: &str,
    auto_renew: bool,
) -> Result<ActivationReceipt, SubmissionError> {
    conn.transaction(|conn| {
        let feature = db::active_feature_by_key(conn, feature_key)?.ok_or_else(|| {
            SubmissionError::validation(format!("unknown or inactive feature {feature_key}"))
        })?;

        let now = Utc::now();
        let credits = db::lock_active_credits_for_player(conn, player_id, now)?;
        let allocations = plan_allocations(&credits, feature.cost_points)?;
        apply_allocations(conn, &allocations)?;

        let debit_id = db::insert_debit(
            conn,
            &NewPointDebit {
                player_id: Some(player_id),
                group_id: None,
                spent_by_player_id: Some(player_id),
                amount: feature.cost_points,
                reason: "feature_activation",
                allocations: json!(allocations),
                created_at: now.naive_utc(),
            },
        )?;

        let activation_id = db::insert_activation(
            conn,
            &NewFeatureActivation {
                player_id: Some(player_id),
                group_id: None,
                feature_id: feature.id,
                start_at: now.naive_utc(),
                end_at: (now + Duration::days(feature.duration_days as i64)).naive_utc(),
                auto_renew,
                status: "active",
            },
        )?;
        db::set_debit_activation(conn, debit_id, activation_id)?;

        Ok(ActivationReceipt {
            activation_id,
            debit_id,
            allocations,
        })
    })
}

/// Spends group credits (and, when a verified member is named as spender,
/// their personal credits too) to activate a feature for a group.
pub fn activate_for_group(
    conn: &mut PgConnection,
    group_id: i32,
    feature_key: &str,
    spender_player_id: Option<i32>,
    auto_renew: bool,
) -> Result<ActivationReceipt, SubmissionError> {
    conn.transaction(|conn| {
        let feature = db::active_feature_by_key(conn, feature_key)?.ok_or_else(|| {
            SubmissionError::validation(format!("unknown or inactive feature {feature_key}"))
        })?;

        if let Some(spender) = spender_player_id {
            if !db::is_member(conn, group_id, spender)? {
                return Err(SubmissionError::validation(
                    "spender is not a member of this group",
                ));
            }
        }

        let now = Utc::now();
        let credits = db::lock_active_credits_for_group(conn, group_id, spender_player_id, now)?;
        let allocations = plan_allocations(&credits, feature.cost_points)?;
        apply_allocations(conn, &allocations)?;

        let debit_id = db::insert_debit(
            conn,
            &NewPointDebit {
                player_id: None,
                group_id: Some(group_id),
                spent_by_player_id: spender_player_id,
                amount: feature.cost_points,
                reason: "feature_activation",
                allocations: json!(allocations),
                created_at: now.naive_utc(),
            },
        )?;

        let activation_id = db::insert_activation(
            conn,
            &NewFeatureActivation {
                player_id: None,
                group_id: Some(group_id),
                feature_id: feature.id,
                start_at: now.naive_utc(),
                end_at: (now + Duration::days(feature.duration_days as i64)).naive_utc(),
                auto_renew,
                status: "active",
            },
        )?;
        db::set_debit_activation(conn, debit_id, activation_id)?;

        Ok(ActivationReceipt {
            activation_id,
            debit_id,
            allocations,
        })
    })
}

fn apply_allocations(
    conn: &mut PgConnection,
    allocations: &[Allocation],
) -> Result<(), SubmissionError> {
    for allocation in allocations {
        db::decrement_credit(conn, allocation.credit_id, allocation.amount)?;
    }
    Ok(())
}

/// Marks due credits as expired. remaining is untouched.
pub fn expire_due_credits(conn: &mut PgConnection) -> Result<usize, SubmissionError> {
    Ok(db::expire_due_credits(conn, Utc::now())?)
}

/// Administrative revocation: zeroes the remaining amount and records why.
pub fn revoke_credit(
    conn: &mut PgConnection,
    credit_id: i64,
    reason: Option<&str>,
) -> Result<(), SubmissionError> {
    Ok(db::revoke_credit(conn, credit_id, reason, Utc::now())?)
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("first of month has a predecessor")
        .day()
}

/// Advances a timestamp by whole months, clamping the day to the target
/// month's last day (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(at: NaiveDateTime, months: u32) -> NaiveDateTime {
    let zero_based = at.month0() + months;
    let year = at.year() + (zero_based / 12) as i32;
    let month = zero_based % 12 + 1;
    let day = at.day().min(last_day_of_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
        .expect("clamped day is valid")
        .and_time(at.time())
}

/// Grants points for all due recurring grants and advances their schedules.
/// Returns the number processed.
pub fn process_recurring_grants(
    conn: &mut PgConnection,
    batch_size: i64,
) -> Result<usize, SubmissionError> {
    let now = Utc::now();
    conn.transaction(|conn| {
        let due = db::lock_due_recurring_grants(conn, now, batch_size)?;
        let mut processed = 0;
        for grant in due {
            let source = match grant.source.as_str() {
                "subscription" | "nitro" => grant.source.clone(),
                _ => "admin".to_string(),
            };
            if let Err(err) = award_points_to_player(
                conn,
                grant.player_id,
                grant.amount_per_period,
                &source,
                None,
            ) {
                warn!("Skipping recurring grant {}: {err}", grant.id);
                continue;
            }
            db::advance_recurring_grant(conn, grant.id, now, add_months(now.naive_utc(), 1))?;
            processed += 1;
        }
        Ok(processed)
    })
}

/// Creates or updates a player's recurring grant. An amount increase
/// (upgrade) pulls the next due time to now so the next sweep grants
/// immediately.
pub fn ensure_recurring_grant(
    conn: &mut PgConnection,
    player_id: i32,
    source: &str,
    amount_per_month: i64,
    external_ref: Option<&str>,
    start_immediately: bool,
) -> Result<i64, SubmissionError> {
    if !matches!(source, "subscription" | "nitro" | "custom") {
        return Err(SubmissionError::validation("invalid recurring grant source"));
    }
    if amount_per_month <= 0 {
        return Err(SubmissionError::validation("amount must be positive"));
    }

    let now: DateTime<Utc> = Utc::now();
    conn.transaction(|conn| {
        let existing = db::find_recurring_grant(conn, player_id, source, external_ref)?;
        let Some(grant) = existing else {
            let next_due = if start_immediately {
                now.naive_utc()
            } else {
                add_months(now.naive_utc(), 1)
            };
            let id = db::insert_recurring_grant(
                conn,
                &NewRecurringPointGrant {
                    player_id,
                    source,
                    external_ref,
                    amount_per_period: amount_per_month,
                    cadence: "monthly",
                    last_granted_at: None,
                    next_due_at: Some(next_due),
                    status: "active",
                },
            )?;
            return Ok(id);
        };

        let upgraded = amount_per_month > grant.amount_per_period;
        let next_due = if upgraded {
            Some(now.naive_utc())
        } else if grant.status != "active" {
            match grant.next_due_at {
                Some(due) if due <= now.naive_utc() => Some(due),
                _ => Some(now.naive_utc()),
            }
        } else {
            grant.next_due_at
        };
        db::update_recurring_grant(conn, grant.id, amount_per_month, "active", next_due)?;
        Ok(grant.id)
    })
}

pub fn cancel_recurring_grant(
    conn: &mut PgConnection,
    player_id: i32,
    source: &str,
    external_ref: Option<&str>,
) -> Result<bool, SubmissionError> {
    conn.transaction(|conn| {
        let Some(grant) = db::find_recurring_grant(conn, player_id, source, external_ref)? else {
            return Ok(false);
        };
        db::update_recurring_grant(conn, grant.id, grant.amount_per_period, "cancelled", None)?;
        Ok(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn credit(
        id: i64,
        remaining: i64,
        earned_day: u32,
        expires: Option<(i32, u32, u32)>,
    ) -> DbPointCredit {
        DbPointCredit {
            id,
            player_id: Some(1),
            group_id: None,
            source: "test".to_string(),
            amount: remaining,
            amount_remaining: remaining,
            earned_at: NaiveDate::from_ymd_opt(2025, 1, earned_day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            expires_at: expires.map(|(y, m, d)| {
                NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            }),
            status: "active".to_string(),
            revoked_at: None,
            revocation_reason: None,
        }
    }

    #[test]
    fn draws_soonest_expiry_first_then_never_expiring() {
        // c1 expires, c2 never does; the feature costs 40.
        let credits = vec![
            credit(2, 30, 1, None),
            credit(1, 30, 2, Some((2025, 2, 1))),
        ];
        let allocations = plan_allocations(&credits, 40).unwrap();
        assert_eq!(
            allocations,
            vec![
                Allocation { credit_id: 1, amount: 30 },
                Allocation { credit_id: 2, amount: 10 },
            ]
        );
        let total: i64 = allocations.iter().map(|a| a.amount).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn ties_break_on_earned_at_then_id() {
        let credits = vec![
            credit(3, 10, 2, Some((2025, 3, 1))),
            credit(2, 10, 1, Some((2025, 3, 1))),
            credit(1, 10, 1, Some((2025, 3, 1))),
        ];
        let allocations = plan_allocations(&credits, 25).unwrap();
        let order: Vec<i64> = allocations.iter().map(|a| a.credit_id).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn insufficient_points_fails_without_partial_plans() {
        let credits = vec![credit(1, 10, 1, None)];
        match plan_allocations(&credits, 40) {
            Err(SubmissionError::InsufficientPoints {
                required,
                available,
            }) => {
                assert_eq!(required, 40);
                assert_eq!(available, 10);
            }
            other => panic!("expected InsufficientPoints, got {other:?}"),
        }
    }

    #[test]
    fn month_addition_clamps_to_month_end() {
        let jan31 = NaiveDate::from_ymd_opt(2025, 1, 31)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(
            add_months(jan31, 1),
            NaiveDate::from_ymd_opt(2025, 2, 28)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );
        // Leap year February keeps the 29th.
        let jan31_leap = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(add_months(jan31_leap, 1).day(), 29);

        let dec15 = NaiveDate::from_ymd_opt(2025, 12, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let advanced = add_months(dec15, 1);
        assert_eq!((advanced.year(), advanced.month(), advanced.day()), (2026, 1, 15));
    }
}
