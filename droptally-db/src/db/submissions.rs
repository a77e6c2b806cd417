use crate::models::{
    DbCollectionLogEntry, DbCombatAchievement, DbDrop, DbItem, DbNpc, DbPersonalBest, DbPlayerPet,
    NewCollectionLogEntry, NewCombatAchievement, NewDrop, NewItem, NewNpc, NewPersonalBest,
    NewPlayerPet,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

pub fn item_by_id(conn: &mut PgConnection, id: i32) -> QueryResult<Option<DbItem>> {
    use crate::schema::items::dsl;

    dsl::items
        .filter(dsl::item_id.eq(id))
        .select(DbItem::as_select())
        .first(conn)
        .optional()
}

pub fn item_by_name(conn: &mut PgConnection, name: &str) -> QueryResult<Option<DbItem>> {
    use crate::schema::items::dsl;

    dsl::items
        .filter(dsl::item_name.eq(name))
        .select(DbItem::as_select())
        .first(conn)
        .optional()
}

pub fn insert_item(conn: &mut PgConnection, item: &NewItem) -> QueryResult<DbItem> {
    use crate::schema::items::dsl;

    let inserted = item
        .insert_into(dsl::items)
        .on_conflict_do_nothing()
        .returning(DbItem::as_returning())
        .get_result(conn)
        .optional()?;
    match inserted {
        Some(item) => Ok(item),
        // Lost a race with a concurrent insert; the row exists now.
        None => item_by_id(conn, item.item_id)?.ok_or(diesel::result::Error::NotFound),
    }
}

pub fn npc_by_name(conn: &mut PgConnection, name: &str) -> QueryResult<Option<DbNpc>> {
    use crate::schema::npcs::dsl;

    dsl::npcs
        .filter(dsl::npc_name.eq(name))
        .select(DbNpc::as_select())
        .first(conn)
        .optional()
}

/// Exact-name lookup first, then a contains match. Adventure-log boss lines
/// abbreviate some boss names.
pub fn npc_by_name_fuzzy(conn: &mut PgConnection, name: &str) -> QueryResult<Option<DbNpc>> {
    use crate::schema::npcs::dsl;

    if let Some(npc) = npc_by_name(conn, name)? {
        return Ok(Some(npc));
    }
    dsl::npcs
        .filter(dsl::npc_name.ilike(format!("%{name}%")))
        .select(DbNpc::as_select())
        .first(conn)
        .optional()
}

pub fn insert_npc(conn: &mut PgConnection, npc: &NewNpc) -> QueryResult<()> {
    use crate::schema::npcs::dsl;

    npc.insert_into(dsl::npcs)
        .on_conflict_do_nothing()
        .execute(conn)
        .map(|_| ())
}

pub fn insert_drop(conn: &mut PgConnection, drop: &NewDrop) -> QueryResult<DbDrop> {
    use crate::schema::drops::dsl;

    drop.insert_into(dsl::drops)
        .returning(DbDrop::as_returning())
        .get_result(conn)
}

pub fn drops_for_player(conn: &mut PgConnection, player_id: i32) -> QueryResult<Vec<DbDrop>> {
    use crate::schema::drops::dsl;

    dsl::drops
        .filter(dsl::player_id.eq(player_id))
        .order_by((dsl::date_added.asc(), dsl::drop_id.asc()))
        .select(DbDrop::as_select())
        .get_results(conn)
}

/// The dedup-window lookups: does a row with this unique id exist within
/// the window? One per kind because each kind has its own table.
pub fn recent_drop_with_unique_id(
    conn: &mut PgConnection,
    unique_id: &str,
    since: DateTime<Utc>,
) -> QueryResult<bool> {
    use crate::schema::drops::dsl;

    diesel::select(diesel::dsl::exists(
        dsl::drops
            .filter(dsl::unique_id.eq(unique_id))
            .filter(dsl::used_api.eq(true))
            .filter(dsl::date_added.gt(since.naive_utc())),
    ))
    .get_result(conn)
}

pub fn recent_pb_with_unique_id(
    conn: &mut PgConnection,
    unique_id: &str,
    since: DateTime<Utc>,
) -> QueryResult<bool> {
    use crate::schema::personal_bests::dsl;

    diesel::select(diesel::dsl::exists(
        dsl::personal_bests
            .filter(dsl::unique_id.eq(unique_id))
            .filter(dsl::date_added.gt(since.naive_utc())),
    ))
    .get_result(conn)
}

pub fn recent_ca_with_unique_id(
    conn: &mut PgConnection,
    unique_id: &str,
    since: DateTime<Utc>,
) -> QueryResult<bool> {
    use crate::schema::combat_achievements::dsl;

    diesel::select(diesel::dsl::exists(
        dsl::combat_achievements
            .filter(dsl::unique_id.eq(unique_id))
            .filter(dsl::date_added.gt(since.naive_utc())),
    ))
    .get_result(conn)
}

pub fn recent_clog_with_unique_id(
    conn: &mut PgConnection,
    unique_id: &str,
    since: DateTime<Utc>,
) -> QueryResult<bool> {
    use crate::schema::collection_log_entries::dsl;

    diesel::select(diesel::dsl::exists(
        dsl::collection_log_entries
            .filter(dsl::unique_id.eq(unique_id))
            .filter(dsl::date_added.gt(since.naive_utc())),
    ))
    .get_result(conn)
}

pub fn recent_pet_with_unique_id(
    conn: &mut PgConnection,
    unique_id: &str,
    since: DateTime<Utc>,
) -> QueryResult<bool> {
    use crate::schema::player_pets::dsl;

    diesel::select(diesel::dsl::exists(
        dsl::player_pets
            .filter(dsl::unique_id.eq(unique_id))
            .filter(dsl::date_added.gt(since.naive_utc())),
    ))
    .get_result(conn)
}

pub fn find_personal_best(
    conn: &mut PgConnection,
    player_id: i32,
    npc_id: i32,
    team_size: &str,
) -> QueryResult<Option<DbPersonalBest>> {
    use crate::schema::personal_bests::dsl;

    dsl::personal_bests
        .filter(dsl::player_id.eq(player_id))
        .filter(dsl::npc_id.eq(npc_id))
        .filter(dsl::team_size.eq(team_size))
        .select(DbPersonalBest::as_select())
        .first(conn)
        .optional()
}

pub fn insert_personal_best(
    conn: &mut PgConnection,
    pb: &NewPersonalBest,
) -> QueryResult<DbPersonalBest> {
    use crate::schema::personal_bests::dsl;

    pb.insert_into(dsl::personal_bests)
        .returning(DbPersonalBest::as_returning())
        .get_result(conn)
}

pub fn update_personal_best(
    conn: &mut PgConnection,
    id: i64,
    best_ms: i64,
    kill_time_ms: i64,
    new_pb: bool,
    image_url: Option<&str>,
    at: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::personal_bests::dsl;

    diesel::update(dsl::personal_bests.filter(dsl::id.eq(id)))
        .set((
            dsl::personal_best_ms.eq(best_ms),
            dsl::kill_time_ms.eq(kill_time_ms),
            dsl::new_pb.eq(new_pb),
            dsl::image_url.eq(image_url),
            dsl::date_added.eq(at.naive_utc()),
        ))
        .execute(conn)
        .map(|_| ())
}

pub fn find_combat_achievement(
    conn: &mut PgConnection,
    player_id: i32,
    task_name: &str,
) -> QueryResult<Option<DbCombatAchievement>> {
    use crate::schema::combat_achievements::dsl;

    dsl::combat_achievements
        .filter(dsl::player_id.eq(player_id))
        .filter(dsl::task_name.eq(task_name))
        .select(DbCombatAchievement::as_select())
        .first(conn)
        .optional()
}

pub fn insert_combat_achievement(
    conn: &mut PgConnection,
    ca: &NewCombatAchievement,
) -> QueryResult<DbCombatAchievement> {
    use crate::schema::combat_achievements::dsl;

    ca.insert_into(dsl::combat_achievements)
        .returning(DbCombatAchievement::as_returning())
        .get_result(conn)
}

pub fn find_collection_log_entry(
    conn: &mut PgConnection,
    player_id: i32,
    item_id: i32,
) -> QueryResult<Option<DbCollectionLogEntry>> {
    use crate::schema::collection_log_entries::dsl;

    dsl::collection_log_entries
        .filter(dsl::player_id.eq(player_id))
        .filter(dsl::item_id.eq(item_id))
        .select(DbCollectionLogEntry::as_select())
        .first(conn)
        .optional()
}

pub fn insert_collection_log_entry(
    conn: &mut PgConnection,
    entry: &NewCollectionLogEntry,
) -> QueryResult<DbCollectionLogEntry> {
    use crate::schema::collection_log_entries::dsl;

    entry
        .insert_into(dsl::collection_log_entries)
        .returning(DbCollectionLogEntry::as_returning())
        .get_result(conn)
}

pub fn find_player_pet(
    conn: &mut PgConnection,
    player_id: i32,
    item_id: i32,
) -> QueryResult<Option<DbPlayerPet>> {
    use crate::schema::player_pets::dsl;

    dsl::player_pets
        .filter(dsl::player_id.eq(player_id))
        .filter(dsl::item_id.eq(item_id))
        .select(DbPlayerPet::as_select())
        .first(conn)
        .optional()
}

pub fn insert_player_pet(conn: &mut PgConnection, pet: &NewPlayerPet) -> QueryResult<DbPlayerPet> {
    use crate::schema::player_pets::dsl;

    pet.insert_into(dsl::player_pets)
        .returning(DbPlayerPet::as_returning())
        .get_result(conn)
}

/// What `/check` returns: the kind label the plugin knows plus the row id.
pub fn check_submission_by_uuid(
    conn: &mut PgConnection,
    uuid: &str,
    since: DateTime<Utc>,
) -> QueryResult<Option<(&'static str, i64)>> {
    use crate::schema::collection_log_entries::dsl as clog_dsl;
    use crate::schema::combat_achievements::dsl as ca_dsl;
    use crate::schema::drops::dsl as drops_dsl;
    use crate::schema::personal_bests::dsl as pb_dsl;

    let since = since.naive_utc();

    let drop_id: Option<i64> = drops_dsl::drops
        .filter(drops_dsl::unique_id.eq(uuid))
        .filter(drops_dsl::used_api.eq(true))
        .filter(drops_dsl::date_added.gt(since))
        .select(drops_dsl::drop_id)
        .first(conn)
        .optional()?;
    if let Some(id) = drop_id {
        return Ok(Some(("drop", id)));
    }

    let log_id: Option<i64> = clog_dsl::collection_log_entries
        .filter(clog_dsl::unique_id.eq(uuid))
        .filter(clog_dsl::used_api.eq(true))
        .filter(clog_dsl::date_added.gt(since))
        .select(clog_dsl::log_id)
        .first(conn)
        .optional()?;
    if let Some(id) = log_id {
        return Ok(Some(("collection_log", id)));
    }

    let pb_id: Option<i64> = pb_dsl::personal_bests
        .filter(pb_dsl::unique_id.eq(uuid))
        .filter(pb_dsl::used_api.eq(true))
        .filter(pb_dsl::date_added.gt(since))
        .select(pb_dsl::id)
        .first(conn)
        .optional()?;
    if let Some(id) = pb_id {
        return Ok(Some(("personal_best", id)));
    }

    let ca_id: Option<i64> = ca_dsl::combat_achievements
        .filter(ca_dsl::unique_id.eq(uuid))
        .filter(ca_dsl::used_api.eq(true))
        .filter(ca_dsl::date_added.gt(since))
        .select(ca_dsl::id)
        .first(conn)
        .optional()?;
    if let Some(id) = ca_id {
        return Ok(Some(("combat_achievement", id)));
    }

    Ok(None)
}
