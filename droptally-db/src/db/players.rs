use crate::models::{DbPlayer, DbUser, NewPlayer};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

pub fn player_by_id(conn: &mut PgConnection, id: i32) -> QueryResult<Option<DbPlayer>> {
    use crate::schema::players::dsl;

    dsl::players
        .filter(dsl::player_id.eq(id))
        .select(DbPlayer::as_select())
        .first(conn)
        .optional()
}

pub fn player_by_account_hash(
    conn: &mut PgConnection,
    account_hash: &str,
) -> QueryResult<Option<DbPlayer>> {
    use crate::schema::players::dsl;

    dsl::players
        .filter(dsl::account_hash.eq(account_hash))
        .select(DbPlayer::as_select())
        .first(conn)
        .optional()
}

/// Case-insensitive display-name lookup. `ilike` without wildcards is an
/// exact match modulo case.
pub fn player_by_name(conn: &mut PgConnection, name: &str) -> QueryResult<Option<DbPlayer>> {
    use crate::schema::players::dsl;

    dsl::players
        .filter(dsl::player_name.ilike(name))
        .select(DbPlayer::as_select())
        .first(conn)
        .optional()
}

pub fn player_by_wom_id(conn: &mut PgConnection, wom_id: i32) -> QueryResult<Option<DbPlayer>> {
    use crate::schema::players::dsl;

    dsl::players
        .filter(dsl::wom_id.eq(wom_id))
        .select(DbPlayer::as_select())
        .first(conn)
        .optional()
}

pub fn insert_player(conn: &mut PgConnection, player: &NewPlayer) -> QueryResult<DbPlayer> {
    use crate::schema::players::dsl;

    player
        .insert_into(dsl::players)
        .returning(DbPlayer::as_returning())
        .get_result(conn)
}

pub fn update_player_name(
    conn: &mut PgConnection,
    player_id: i32,
    name: &str,
    at: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::players::dsl;

    diesel::update(dsl::players.filter(dsl::player_id.eq(player_id)))
        .set((
            dsl::player_name.eq(name),
            dsl::date_updated.eq(at.naive_utc()),
        ))
        .execute(conn)
        .map(|_| ())
}

pub fn bind_account_hash(
    conn: &mut PgConnection,
    player_id: i32,
    account_hash: &str,
) -> QueryResult<()> {
    use crate::schema::players::dsl;

    diesel::update(dsl::players.filter(dsl::player_id.eq(player_id)))
        .set(dsl::account_hash.eq(account_hash))
        .execute(conn)
        .map(|_| ())
}

pub fn touch_player(conn: &mut PgConnection, player_id: i32, at: DateTime<Utc>) -> QueryResult<()> {
    use crate::schema::players::dsl;

    diesel::update(dsl::players.filter(dsl::player_id.eq(player_id)))
        .set(dsl::date_updated.eq(at.naive_utc()))
        .execute(conn)
        .map(|_| ())
}

pub fn search_players(
    conn: &mut PgConnection,
    fragment: &str,
    limit: i64,
) -> QueryResult<Vec<DbPlayer>> {
    use crate::schema::players::dsl;

    dsl::players
        .filter(dsl::player_name.ilike(format!("%{fragment}%")))
        .filter(dsl::hidden.eq(false))
        .order_by(dsl::player_name.asc())
        .limit(limit)
        .select(DbPlayer::as_select())
        .get_results(conn)
}

pub fn all_player_ids(conn: &mut PgConnection) -> QueryResult<Vec<i32>> {
    use crate::schema::players::dsl;

    dsl::players
        .order_by(dsl::player_id.asc())
        .select(dsl::player_id)
        .get_results(conn)
}

pub fn user_by_id(conn: &mut PgConnection, user_id: i32) -> QueryResult<Option<DbUser>> {
    use crate::schema::users::dsl;

    dsl::users
        .filter(dsl::user_id.eq(user_id))
        .select(DbUser::as_select())
        .first(conn)
        .optional()
}

pub fn user_config_value(
    conn: &mut PgConnection,
    user_id: i32,
    key: &str,
) -> QueryResult<Option<String>> {
    use crate::schema::user_configurations::dsl;

    dsl::user_configurations
        .filter(dsl::user_id.eq(user_id))
        .filter(dsl::config_key.eq(key))
        .select(dsl::config_value)
        .first(conn)
        .optional()
}
