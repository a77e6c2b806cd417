use crate::auth;
use crate::context::SubmissionContext;
use crate::error::SubmissionError;
use crate::normalize::display_names_equivalent;
use crate::notify;
use chrono::Utc;
use droptally_db::db;
use droptally_db::models::{DbItem, DbPlayer, NewItem, NewNpc, NewPlayer};
use hashbrown::HashMap;
use log::{debug, info, warn};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

const NAME_CACHE_CAPACITY: usize = 4096;

/// Bounded FIFO name -> id cache. Saves a DB (or wiki) round trip for the
/// handful of NPCs every drop references.
pub struct NameIdCache {
    inner: Mutex<(HashMap<String, i32>, VecDeque<String>)>,
}

impl Default for NameIdCache {
    fn default() -> Self {
        Self {
            inner: Mutex::new((HashMap::new(), VecDeque::new())),
        }
    }
}

impl NameIdCache {
    pub fn get(&self, name: &str) -> Option<i32> {
        let inner = self.inner.lock().expect("name cache poisoned");
        inner.0.get(name).copied()
    }

    pub fn insert(&self, name: &str, id: i32) {
        let mut inner = self.inner.lock().expect("name cache poisoned");
        let (map, order) = &mut *inner;
        if map.insert(name.to_string(), id).is_none() {
            order.push_back(name.to_string());
            if order.len() > NAME_CACHE_CAPACITY {
                if let Some(evicted) = order.pop_front() {
                    map.remove(&evicted);
                }
            }
        }
    }
}

/// Doom of Mokhaiotl personal bests are stored one NPC id per floor,
/// incrementing from the base id. A level we can't parse falls back to the
/// generic Doom id.
const DOOM_BASE_ID: i32 = 14707;
const DOOM_FALLBACK_ID: i32 = 14704;

pub fn doom_npc_id(npc_name: &str) -> Option<(i32, String)> {
    if !npc_name.is_ascii() {
        return None;
    }
    let lower = npc_name.to_lowercase();
    if !lower.contains("doom of mokhaiotl") || !lower.contains("(level") {
        return None;
    }

    let level_at = lower.find("(level")?;
    let after_marker = &npc_name[level_at + "(level".len()..];
    let digits: String = after_marker
        .chars()
        .skip_while(|c| *c == ':' || c.is_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    match digits.parse::<i32>() {
        Ok(level) => {
            let canonical = format!("{} (Level {level})", npc_name[..level_at].trim_end());
            Some((DOOM_BASE_ID + level, canonical))
        }
        Err(_) => Some((DOOM_FALLBACK_ID, npc_name.to_string())),
    }
}

/// Resolves (or creates) the player a submission claims to be from, then
/// runs the auth gate. Creation consults the external metadata service; a
/// player that service does not know is treated as nonexistent.
pub async fn resolve_player_and_auth(
    ctx: &SubmissionContext,
    player_name: &str,
    account_hash: &str,
) -> Result<DbPlayer, SubmissionError> {
    if account_hash.len() < 5 {
        return Err(SubmissionError::validation(
            "account hash too short to identify an account",
        ));
    }

    let name = player_name.to_string();
    let hash = account_hash.to_string();
    let existing = ctx
        .run_db(move |conn| {
            if let Some(player) = db::player_by_account_hash(conn, &hash)? {
                return Ok(Some(player));
            }
            Ok(db::player_by_name(conn, &name)?)
        })
        .await?;

    let player = match existing {
        Some(player) if !display_names_equivalent(&player.player_name, player_name) => {
            // The hash matched a row under a drifted display name. Confirm
            // the submitted spelling externally before reconciling; an
            // unconfirmed name keeps the stored one and fails the gate.
            match ctx.wom.player_details(player_name).await? {
                Some(_) => reconcile_name(ctx, player, player_name).await?,
                None => player,
            }
        }
        Some(player) => player,
        None => create_player(ctx, player_name, account_hash).await?,
    };

    let name = player_name.to_string();
    let hash = account_hash.to_string();
    let decision = ctx
        .run_db(move |conn| Ok(auth::check_auth(conn, &name, &hash)?))
        .await?;
    if !decision.player_exists || !decision.authed {
        return Err(SubmissionError::AuthFailure);
    }

    Ok(player)
}

async fn create_player(
    ctx: &SubmissionContext,
    player_name: &str,
    account_hash: &str,
) -> Result<DbPlayer, SubmissionError> {
    let Some(wom_player) = ctx.wom.player_details(player_name).await? else {
        debug!("Metadata service does not know {player_name}; refusing to create");
        return Err(SubmissionError::AuthFailure);
    };

    // The external id or the submitted hash may already identify a row
    // under an older display name.
    let wom_id = wom_player.wom_id;
    let hash = account_hash.to_string();
    let known = ctx
        .run_db(move |conn| {
            if let Some(player) = db::player_by_wom_id(conn, wom_id)? {
                return Ok(Some(player));
            }
            Ok(db::player_by_account_hash(conn, &hash)?)
        })
        .await?;

    if let Some(player) = known {
        if !display_names_equivalent(&player.player_name, player_name) {
            return reconcile_name(ctx, player, player_name).await;
        }
        return Ok(player);
    }

    let name = player_name.to_string();
    let hash = account_hash.to_string();
    let (total_level, log_slots) = (wom_player.total_level, wom_player.log_slots.max(0));
    let created = ctx
        .run_db(move |conn| {
            let now = Utc::now().naive_utc();
            let player = db::insert_player(
                conn,
                &NewPlayer {
                    wom_id: Some(wom_id),
                    player_name: &name,
                    account_hash: Some(&hash),
                    log_slots,
                    total_level,
                    date_added: now,
                    date_updated: now,
                },
            )?;
            db::ensure_global_membership(conn, player.player_id)?;
            Ok(player)
        })
        .await?;
    info!(
        "Created player {} with id {} (wom id {wom_id})",
        created.player_name, created.player_id
    );

    let data = json!({
        "player_name": created.player_name,
        "player_id": created.player_id,
        "wom_id": wom_id,
        "account_hash": account_hash,
    });
    notify::enqueue(ctx, "new_player", created.player_id, &data, None).await?;

    Ok(created)
}

/// Updates a player's display name and fans out the name-change
/// notifications (including the owner DM when opted in).
pub async fn reconcile_name(
    ctx: &SubmissionContext,
    player: DbPlayer,
    new_name: &str,
) -> Result<DbPlayer, SubmissionError> {
    let old_name = player.player_name.clone();
    let name = new_name.to_string();
    let player_id = player.player_id;
    ctx.run_db(move |conn| Ok(db::update_player_name(conn, player_id, &name, Utc::now())?))
        .await?;
    info!("Player {old_name} renamed to {new_name}");

    let data = json!({
        "player_name": new_name,
        "player_id": player.player_id,
        "old_name": old_name,
    });
    notify::enqueue(ctx, "name_change", player.player_id, &data, None).await?;
    notify::enqueue_dm_if_enabled(ctx, &player, "dm_account_changes", "dm_name_change", &data)
        .await?;

    Ok(DbPlayer {
        player_name: new_name.to_string(),
        ..player
    })
}

/// Resolves an item by id, then by name, then by asking the wiki. A row is
/// only created when the wiki confirms the item exists and the client
/// supplied the id; the resolver never creates rows on client assertion.
pub async fn resolve_item(
    ctx: &SubmissionContext,
    item_id: Option<i32>,
    item_name: Option<&str>,
) -> Result<Option<DbItem>, SubmissionError> {
    if let Some(id) = item_id {
        let found = ctx.run_db(move |conn| Ok(db::item_by_id(conn, id)?)).await?;
        if let Some(item) = found {
            return Ok(Some(item));
        }
    }

    let Some(name) = item_name else {
        return Ok(None);
    };

    let lookup_name = name.to_string();
    let found = ctx
        .run_db(move |conn| Ok(db::item_by_name(conn, &lookup_name)?))
        .await?;
    if let Some(item) = found {
        return Ok(Some(item));
    }

    let confirmed_id = match item_id {
        Some(id) => ctx.osrs.semantic.item_exists(name).await?.then_some(id),
        None => ctx.osrs.semantic.item_id(name).await?,
    };
    let Some(id) = confirmed_id else {
        return Ok(None);
    };

    let name = name.to_string();
    let item = ctx
        .run_db(move |conn| {
            Ok(db::insert_item(
                conn,
                &NewItem {
                    item_id: id,
                    item_name: &name,
                    stackable: false,
                    noted: false,
                },
            )?)
        })
        .await?;
    Ok(Some(item))
}

/// Resolves an NPC name to (id, canonical name) through the in-memory
/// cache, the DB, and finally the wiki. A still-unknown NPC enqueues a
/// `new_npc` notification for operator review and resolves to None.
pub async fn resolve_npc(
    ctx: &SubmissionContext,
    npc_name: &str,
    player_id: i32,
    player_name: &str,
) -> Result<Option<(i32, String)>, SubmissionError> {
    if npc_name.is_empty() {
        return Ok(None);
    }

    if let Some(resolved) = doom_npc_id(npc_name) {
        return Ok(Some(resolved));
    }

    if let Some(id) = ctx.npc_ids.get(npc_name) {
        return Ok(Some((id, npc_name.to_string())));
    }

    let lookup_name = npc_name.to_string();
    let found = ctx
        .run_db(move |conn| Ok(db::npc_by_name(conn, &lookup_name)?))
        .await?;
    if let Some(npc) = found {
        ctx.npc_ids.insert(npc_name, npc.npc_id);
        return Ok(Some((npc.npc_id, npc_name.to_string())));
    }

    match ctx.osrs.semantic.npc_id(npc_name).await {
        Ok(Some(id)) => {
            let name = npc_name.to_string();
            ctx.run_db(move |conn| {
                Ok(db::insert_npc(
                    conn,
                    &NewNpc {
                        npc_id: id,
                        npc_name: &name,
                    },
                )?)
            })
            .await?;
            ctx.npc_ids.insert(npc_name, id);
            return Ok(Some((id, npc_name.to_string())));
        }
        Ok(None) => {}
        Err(err) => warn!("Wiki NPC lookup failed for {npc_name}: {err}"),
    }

    let data = json!({
        "npc_name": npc_name,
        "player_name": player_name,
        "player_id": player_id,
    });
    notify::enqueue(ctx, "new_npc", player_id, &data, None).await?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doom_levels_map_to_per_floor_ids() {
        assert_eq!(
            doom_npc_id("Doom of Mokhaiotl (Level 3)"),
            Some((14710, "Doom of Mokhaiotl (Level 3)".to_string()))
        );
        assert_eq!(
            doom_npc_id("Doom of Mokhaiotl (Level: 7)"),
            Some((14714, "Doom of Mokhaiotl (Level 7)".to_string()))
        );
        // Spacing is normalized in the canonical name.
        assert_eq!(
            doom_npc_id("Doom of Mokhaiotl  (Level  2)"),
            Some((14709, "Doom of Mokhaiotl (Level 2)".to_string()))
        );
    }

    #[test]
    fn malformed_doom_level_falls_back_to_base_id() {
        assert_eq!(
            doom_npc_id("Doom of Mokhaiotl (Level ??)"),
            Some((14704, "Doom of Mokhaiotl (Level ??)".to_string()))
        );
    }

    #[test]
    fn non_doom_names_pass_through() {
        assert_eq!(doom_npc_id("King Black Dragon"), None);
        assert_eq!(doom_npc_id("Doom of Mokhaiotl"), None);
    }

    #[test]
    fn name_cache_is_bounded_fifo() {
        let cache = NameIdCache::default();
        for i in 0..(NAME_CACHE_CAPACITY + 10) {
            cache.insert(&format!("npc {i}"), i as i32);
        }
        assert_eq!(cache.get("npc 0"), None);
        assert_eq!(
            cache.get(&format!("npc {}", NAME_CACHE_CAPACITY + 9)),
            Some(NAME_CACHE_CAPACITY as i32 + 9)
        );
    }
}
