use crate::GLOBAL_GROUP_ID;
use crate::models::{DbGroup, DbGroupConfiguration, DbPlayer};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

pub fn group_by_id(conn: &mut PgConnection, id: i32) -> QueryResult<Option<DbGroup>> {
    use crate::schema::groups::dsl;

    dsl::groups
        .filter(dsl::group_id.eq(id))
        .select(DbGroup::as_select())
        .first(conn)
        .optional()
}

pub fn all_groups(conn: &mut PgConnection) -> QueryResult<Vec<DbGroup>> {
    use crate::schema::groups::dsl;

    dsl::groups
        .order_by(dsl::group_id.asc())
        .select(DbGroup::as_select())
        .get_results(conn)
}

pub fn groups_with_external_roster(conn: &mut PgConnection) -> QueryResult<Vec<DbGroup>> {
    use crate::schema::groups::dsl;

    dsl::groups
        .filter(dsl::wom_group_id.is_not_null())
        .order_by(dsl::group_id.asc())
        .select(DbGroup::as_select())
        .get_results(conn)
}

/// All groups a player belongs to, with global membership enforced first.
pub fn groups_for_player(conn: &mut PgConnection, player_id: i32) -> QueryResult<Vec<DbGroup>> {
    use crate::schema::group_members::dsl as members_dsl;
    use crate::schema::groups::dsl as groups_dsl;

    ensure_global_membership(conn, player_id)?;

    groups_dsl::groups
        .inner_join(members_dsl::group_members)
        .filter(members_dsl::player_id.eq(player_id))
        .order_by(groups_dsl::group_id.asc())
        .select(DbGroup::as_select())
        .get_results(conn)
}

pub fn group_ids_for_player(conn: &mut PgConnection, player_id: i32) -> QueryResult<Vec<i32>> {
    use crate::schema::group_members::dsl;

    dsl::group_members
        .filter(dsl::player_id.eq(player_id))
        .order_by(dsl::group_id.asc())
        .select(dsl::group_id)
        .get_results(conn)
}

pub fn ensure_global_membership(conn: &mut PgConnection, player_id: i32) -> QueryResult<()> {
    add_membership(conn, player_id, GLOBAL_GROUP_ID)
}

pub fn add_membership(conn: &mut PgConnection, player_id: i32, group_id: i32) -> QueryResult<()> {
    use crate::schema::group_members::dsl;

    diesel::insert_into(dsl::group_members)
        .values((dsl::player_id.eq(player_id), dsl::group_id.eq(group_id)))
        .on_conflict_do_nothing()
        .execute(conn)
        .map(|_| ())
}

pub fn remove_membership(
    conn: &mut PgConnection,
    player_id: i32,
    group_id: i32,
) -> QueryResult<()> {
    use crate::schema::group_members::dsl;

    diesel::delete(
        dsl::group_members
            .filter(dsl::player_id.eq(player_id))
            .filter(dsl::group_id.eq(group_id)),
    )
    .execute(conn)
    .map(|_| ())
}

pub fn is_member(conn: &mut PgConnection, group_id: i32, player_id: i32) -> QueryResult<bool> {
    use crate::schema::group_members::dsl;

    diesel::select(diesel::dsl::exists(
        dsl::group_members
            .filter(dsl::group_id.eq(group_id))
            .filter(dsl::player_id.eq(player_id)),
    ))
    .get_result(conn)
}

pub fn group_members(conn: &mut PgConnection, group_id: i32) -> QueryResult<Vec<DbPlayer>> {
    use crate::schema::group_members::dsl as members_dsl;
    use crate::schema::players::dsl as players_dsl;

    players_dsl::players
        .inner_join(members_dsl::group_members)
        .filter(members_dsl::group_id.eq(group_id))
        .order_by(players_dsl::player_id.asc())
        .select(DbPlayer::as_select())
        .get_results(conn)
}

pub fn group_config_value(
    conn: &mut PgConnection,
    group_id: i32,
    key: &str,
) -> QueryResult<Option<String>> {
    use crate::schema::group_configurations::dsl;

    dsl::group_configurations
        .filter(dsl::group_id.eq(group_id))
        .filter(dsl::config_key.eq(key))
        .select(dsl::config_value)
        .first(conn)
        .optional()
}

pub fn group_config_all(
    conn: &mut PgConnection,
    group_id: i32,
) -> QueryResult<Vec<DbGroupConfiguration>> {
    use crate::schema::group_configurations::dsl;

    dsl::group_configurations
        .filter(dsl::group_id.eq(group_id))
        .order_by(dsl::config_key.asc())
        .select(DbGroupConfiguration::as_select())
        .get_results(conn)
}

pub fn touch_group(conn: &mut PgConnection, group_id: i32, at: DateTime<Utc>) -> QueryResult<()> {
    use crate::schema::groups::dsl;

    diesel::update(dsl::groups.filter(dsl::group_id.eq(group_id)))
        .set(dsl::date_updated.eq(at.naive_utc()))
        .execute(conn)
        .map(|_| ())
}

pub fn search_groups(
    conn: &mut PgConnection,
    fragment: &str,
    limit: i64,
) -> QueryResult<Vec<DbGroup>> {
    use crate::schema::groups::dsl;

    dsl::groups
        .filter(dsl::group_name.ilike(format!("%{fragment}%")))
        .order_by(dsl::group_name.asc())
        .limit(limit)
        .select(DbGroup::as_select())
        .get_results(conn)
}

/// Whether the group currently has an active activation of the named
/// premium feature.
pub fn group_has_active_feature(
    conn: &mut PgConnection,
    group_id: i32,
    feature_key: &str,
    now: DateTime<Utc>,
) -> QueryResult<bool> {
    use crate::schema::feature_activations::dsl as activations_dsl;
    use crate::schema::premium_features::dsl as features_dsl;

    diesel::select(diesel::dsl::exists(
        activations_dsl::feature_activations
            .inner_join(features_dsl::premium_features)
            .filter(activations_dsl::group_id.eq(group_id))
            .filter(activations_dsl::status.eq("active"))
            .filter(activations_dsl::end_at.gt(now.naive_utc()))
            .filter(features_dsl::feature_key.eq(feature_key)),
    ))
    .get_result(conn)
}
