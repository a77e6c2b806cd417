use crate::models::{
    DbPointCredit, DbPremiumFeature, DbRecurringPointGrant, NewFeatureActivation, NewPointCredit,
    NewPointDebit, NewRecurringPointGrant,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

pub fn insert_credit(conn: &mut PgConnection, credit: &NewPointCredit) -> QueryResult<i64> {
    use crate::schema::point_credits::dsl;

    credit
        .insert_into(dsl::point_credits)
        .returning(dsl::id)
        .get_result(conn)
}

/// Active, unexpired, non-empty credits for a player, locked for update, in
/// consumption order: soonest expiry first (nulls last), then earliest
/// earned_at, then id.
pub fn lock_active_credits_for_player(
    conn: &mut PgConnection,
    player_id: i32,
    now: DateTime<Utc>,
) -> QueryResult<Vec<DbPointCredit>> {
    use crate::schema::point_credits::dsl;

    dsl::point_credits
        .filter(dsl::player_id.eq(player_id))
        .filter(dsl::status.eq("active"))
        .filter(dsl::expires_at.is_null().or(dsl::expires_at.gt(now.naive_utc())))
        .filter(dsl::amount_remaining.gt(0))
        .order((
            dsl::expires_at.is_null().asc(),
            dsl::expires_at.asc(),
            dsl::earned_at.asc(),
            dsl::id.asc(),
        ))
        .for_update()
        .select(DbPointCredit::as_select())
        .get_results(conn)
}

/// Locking clauses aren't available on boxed queries, so the spender and
/// group-only shapes are written out separately.
pub fn lock_active_credits_for_group(
    conn: &mut PgConnection,
    group_id: i32,
    spender_player_id: Option<i32>,
    now: DateTime<Utc>,
) -> QueryResult<Vec<DbPointCredit>> {
    use crate::schema::point_credits::dsl;

    match spender_player_id {
        Some(player_id) => dsl::point_credits
            .filter(dsl::status.eq("active"))
            .filter(dsl::expires_at.is_null().or(dsl::expires_at.gt(now.naive_utc())))
            .filter(dsl::amount_remaining.gt(0))
            .filter(dsl::group_id.eq(group_id).or(dsl::player_id.eq(player_id)))
            .order((
                dsl::expires_at.is_null().asc(),
                dsl::expires_at.asc(),
                dsl::earned_at.asc(),
                dsl::id.asc(),
            ))
            .for_update()
            .select(DbPointCredit::as_select())
            .get_results(conn),
        None => dsl::point_credits
            .filter(dsl::status.eq("active"))
            .filter(dsl::expires_at.is_null().or(dsl::expires_at.gt(now.naive_utc())))
            .filter(dsl::amount_remaining.gt(0))
            .filter(dsl::group_id.eq(group_id))
            .order((
                dsl::expires_at.is_null().asc(),
                dsl::expires_at.asc(),
                dsl::earned_at.asc(),
                dsl::id.asc(),
            ))
            .for_update()
            .select(DbPointCredit::as_select())
            .get_results(conn),
    }
}

pub fn decrement_credit(conn: &mut PgConnection, credit_id: i64, by: i64) -> QueryResult<()> {
    use crate::schema::point_credits::dsl;

    diesel::update(dsl::point_credits.filter(dsl::id.eq(credit_id)))
        .set(dsl::amount_remaining.eq(dsl::amount_remaining - by))
        .execute(conn)
        .map(|_| ())
}

pub fn insert_debit(conn: &mut PgConnection, debit: &NewPointDebit) -> QueryResult<i64> {
    use crate::schema::point_debits::dsl;

    debit
        .insert_into(dsl::point_debits)
        .returning(dsl::id)
        .get_result(conn)
}

pub fn set_debit_activation(
    conn: &mut PgConnection,
    debit_id: i64,
    activation_id: i64,
) -> QueryResult<()> {
    use crate::schema::point_debits::dsl;

    diesel::update(dsl::point_debits.filter(dsl::id.eq(debit_id)))
        .set(dsl::activation_id.eq(activation_id))
        .execute(conn)
        .map(|_| ())
}

pub fn active_feature_by_key(
    conn: &mut PgConnection,
    key: &str,
) -> QueryResult<Option<DbPremiumFeature>> {
    use crate::schema::premium_features::dsl;

    dsl::premium_features
        .filter(dsl::feature_key.eq(key))
        .filter(dsl::active.eq(true))
        .select(DbPremiumFeature::as_select())
        .first(conn)
        .optional()
}

pub fn insert_activation(
    conn: &mut PgConnection,
    activation: &NewFeatureActivation,
) -> QueryResult<i64> {
    use crate::schema::feature_activations::dsl;

    activation
        .insert_into(dsl::feature_activations)
        .returning(dsl::id)
        .get_result(conn)
}

/// Flip active credits whose expiry has passed to expired. remaining is
/// left untouched, only the status changes.
pub fn expire_due_credits(conn: &mut PgConnection, now: DateTime<Utc>) -> QueryResult<usize> {
    use crate::schema::point_credits::dsl;

    diesel::update(
        dsl::point_credits
            .filter(dsl::status.eq("active"))
            .filter(dsl::expires_at.is_not_null())
            .filter(dsl::expires_at.le(now.naive_utc())),
    )
    .set(dsl::status.eq("expired"))
    .execute(conn)
}

pub fn revoke_credit(
    conn: &mut PgConnection,
    credit_id: i64,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::point_credits::dsl;

    diesel::update(dsl::point_credits.filter(dsl::id.eq(credit_id)))
        .set((
            dsl::amount_remaining.eq(0),
            dsl::status.eq("revoked"),
            dsl::revoked_at.eq(now.naive_utc()),
            dsl::revocation_reason.eq(reason),
        ))
        .execute(conn)
        .map(|_| ())
}

/// Due monthly grants in deterministic order, locked for the sweep.
pub fn lock_due_recurring_grants(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    limit: i64,
) -> QueryResult<Vec<DbRecurringPointGrant>> {
    use crate::schema::recurring_point_grants::dsl;

    dsl::recurring_point_grants
        .filter(dsl::status.eq("active"))
        .filter(dsl::cadence.eq("monthly"))
        .filter(dsl::next_due_at.is_not_null())
        .filter(dsl::next_due_at.le(now.naive_utc()))
        .order((dsl::next_due_at.asc(), dsl::id.asc()))
        .limit(limit)
        .for_update()
        .select(DbRecurringPointGrant::as_select())
        .get_results(conn)
}

pub fn advance_recurring_grant(
    conn: &mut PgConnection,
    grant_id: i64,
    granted_at: DateTime<Utc>,
    next_due_at: chrono::NaiveDateTime,
) -> QueryResult<()> {
    use crate::schema::recurring_point_grants::dsl;

    diesel::update(dsl::recurring_point_grants.filter(dsl::id.eq(grant_id)))
        .set((
            dsl::last_granted_at.eq(granted_at.naive_utc()),
            dsl::next_due_at.eq(next_due_at),
        ))
        .execute(conn)
        .map(|_| ())
}

pub fn find_recurring_grant(
    conn: &mut PgConnection,
    player_id: i32,
    source: &str,
    external_ref: Option<&str>,
) -> QueryResult<Option<DbRecurringPointGrant>> {
    use crate::schema::recurring_point_grants::dsl;

    let mut query = dsl::recurring_point_grants
        .filter(dsl::player_id.eq(player_id))
        .filter(dsl::source.eq(source))
        .into_boxed();

    query = match external_ref {
        Some(external_ref) => query.filter(dsl::external_ref.eq(external_ref)),
        None => query.filter(dsl::external_ref.is_null()),
    };

    query
        .select(DbRecurringPointGrant::as_select())
        .first(conn)
        .optional()
}

pub fn insert_recurring_grant(
    conn: &mut PgConnection,
    grant: &NewRecurringPointGrant,
) -> QueryResult<i64> {
    use crate::schema::recurring_point_grants::dsl;

    grant
        .insert_into(dsl::recurring_point_grants)
        .returning(dsl::id)
        .get_result(conn)
}

pub fn update_recurring_grant(
    conn: &mut PgConnection,
    grant_id: i64,
    amount_per_period: i64,
    status: &str,
    next_due_at: Option<chrono::NaiveDateTime>,
) -> QueryResult<()> {
    use crate::schema::recurring_point_grants::dsl;

    diesel::update(dsl::recurring_point_grants.filter(dsl::id.eq(grant_id)))
        .set((
            dsl::amount_per_period.eq(amount_per_period),
            dsl::status.eq(status),
            dsl::next_due_at.eq(next_due_at),
        ))
        .execute(conn)
        .map(|_| ())
}
