use crate::Db;
use crate::api::ApiError;
use droptally_core::SubmissionContext;
use droptally_core::groups::{ConfigValue, coerce_config_value};
use droptally_db::models::DbGroupConfiguration;
use droptally_db::{GLOBAL_GROUP_ID, db};
use rocket::serde::json::Json;
use rocket::{State, get};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Looks up a key across a group's config rows, preferring the short value
/// and falling back to the long-text column.
fn config_value(configs: &[DbGroupConfiguration], key: &str) -> ConfigValue {
    for config in configs {
        if config.config_key == key {
            let raw = if config.config_value.is_empty() {
                config.long_value.as_deref().unwrap_or("")
            } else {
                &config.config_value
            };
            return coerce_config_value(raw);
        }
    }
    ConfigValue::Text(String::new())
}

/// The per-group gating config the plugin fetches at login.
#[get("/load_config?<player_name>&<acc_hash>")]
pub async fn load_config(
    player_name: String,
    acc_hash: String,
    db: Db,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let configs = db
        .run(move |conn| {
            let Some(player) = db::player_by_name(conn, &player_name)? else {
                return Ok(None);
            };
            if player.account_hash.as_deref() != Some(acc_hash.as_str()) {
                return Ok(None);
            }

            let mut entries = Vec::new();
            for group_id in db::group_ids_for_player(conn, player.player_id)? {
                let Some(group) = db::group_by_id(conn, group_id)? else {
                    continue;
                };
                let group_configs = db::group_config_all(conn, group_id)?;
                entries.push((group, group_configs));
            }
            Ok::<_, diesel::result::Error>(Some(entries))
        })
        .await?
        .ok_or_else(|| ApiError::bad_request("Player not found"))?;

    let response = configs
        .into_iter()
        .map(|(group, configs)| {
            json!({
                "group_id": group.group_id,
                "group_name": group.group_name,
                "min_value": config_value(&configs, "minimum_value_to_notify"),
                "minimum_drop_value": config_value(&configs, "minimum_value_to_notify"),
                "only_screenshots": config_value(&configs, "only_send_messages_with_images"),
                "send_drops": true,
                "send_pbs": config_value(&configs, "notify_pbs"),
                "send_clogs": config_value(&configs, "notify_clogs"),
                "send_cas": config_value(&configs, "notify_cas"),
                "send_pets": config_value(&configs, "notify_pets"),
                "send_xp": config_value(&configs, "notify_levels"),
                "minimum_level": config_value(&configs, "level_minimum_for_notifications"),
                "send_stacked_items": config_value(&configs, "send_stacks_of_items"),
                "minimum_ca_tier": config_value(&configs, "min_ca_tier_to_notify"),
            })
        })
        .collect();

    Ok(Json(response))
}

#[derive(Serialize)]
pub struct RankedPlayer {
    pub player_id: i32,
    pub player_name: String,
    pub total: i64,
}

#[get("/top_players?<group_id>&<partition>&<limit>")]
pub async fn top_players(
    group_id: Option<i32>,
    partition: Option<i32>,
    limit: Option<usize>,
    ctx: &State<Arc<SubmissionContext>>,
    db: Db,
) -> Result<Json<Vec<RankedPlayer>>, ApiError> {
    let limit = limit.unwrap_or(10).min(100);
    let entries = ctx.leaderboard.top_players(group_id, partition, limit).await?;

    let ids: Vec<i32> = entries.iter().map(|(id, _)| *id).collect();
    let names = db
        .run(move |conn| {
            let mut names = Vec::with_capacity(ids.len());
            for id in ids {
                names.push(db::player_by_id(conn, id)?.map(|p| p.player_name));
            }
            Ok::<_, diesel::result::Error>(names)
        })
        .await?;

    let ranked = entries
        .into_iter()
        .zip(names)
        .map(|((player_id, total), name)| RankedPlayer {
            player_id,
            player_name: name.unwrap_or_else(|| format!("#{player_id}")),
            total,
        })
        .collect();
    Ok(Json(ranked))
}

#[derive(Serialize)]
pub struct RankedGroup {
    pub group_id: i32,
    pub group_name: String,
    pub total: i64,
}

#[get("/top_groups?<partition>&<limit>")]
pub async fn top_groups(
    partition: Option<i32>,
    limit: Option<usize>,
    ctx: &State<Arc<SubmissionContext>>,
    db: Db,
) -> Result<Json<Vec<RankedGroup>>, ApiError> {
    let groups = db.run(|conn| db::all_groups(conn)).await?;

    let mut ranked = Vec::with_capacity(groups.len());
    for group in groups {
        // The global group is excluded from cross-group rankings.
        if group.group_id == GLOBAL_GROUP_ID {
            continue;
        }
        let total = ctx
            .leaderboard
            .group_monthly_total(group.group_id, partition)
            .await?;
        ranked.push(RankedGroup {
            group_id: group.group_id,
            group_name: group.group_name,
            total,
        });
    }
    ranked.sort_by(|a, b| b.total.cmp(&a.total));
    ranked.truncate(limit.unwrap_or(10).min(100));
    Ok(Json(ranked))
}

#[get("/top_npcs?<group_id>&<npc_id>&<partition>&<limit>")]
pub async fn top_npcs(
    group_id: i32,
    npc_id: i32,
    partition: Option<i32>,
    limit: Option<usize>,
    ctx: &State<Arc<SubmissionContext>>,
    db: Db,
) -> Result<Json<Vec<RankedPlayer>>, ApiError> {
    let limit = limit.unwrap_or(10).min(100);
    let entries = ctx
        .leaderboard
        .top_players_for_npc(group_id, npc_id, partition, limit)
        .await?;

    let ids: Vec<i32> = entries.iter().map(|(id, _)| *id).collect();
    let names = db
        .run(move |conn| {
            let mut names = Vec::with_capacity(ids.len());
            for id in ids {
                names.push(db::player_by_id(conn, id)?.map(|p| p.player_name));
            }
            Ok::<_, diesel::result::Error>(names)
        })
        .await?;

    let ranked = entries
        .into_iter()
        .zip(names)
        .map(|((player_id, total), name)| RankedPlayer {
            player_id,
            player_name: name.unwrap_or_else(|| format!("#{player_id}")),
            total,
        })
        .collect();
    Ok(Json(ranked))
}

#[derive(Serialize)]
pub struct PlayerSearchResult {
    pub player_id: i32,
    pub player_name: String,
    pub monthly_total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranked_players: Option<u64>,
}

#[get("/player_search?<name>")]
pub async fn player_search(
    name: String,
    ctx: &State<Arc<SubmissionContext>>,
    db: Db,
) -> Result<Json<Vec<PlayerSearchResult>>, ApiError> {
    let players = db.run(move |conn| db::search_players(conn, &name, 10)).await?;

    let mut results = Vec::with_capacity(players.len());
    for player in players {
        let monthly_total = ctx.leaderboard.monthly_total(player.player_id, None).await?;
        let rank = ctx.leaderboard.rank_of(player.player_id, None, None).await?;
        results.push(PlayerSearchResult {
            player_id: player.player_id,
            player_name: player.player_name,
            monthly_total,
            rank: rank.map(|(rank, _)| rank),
            ranked_players: rank.map(|(_, total)| total),
        });
    }
    Ok(Json(results))
}

#[get("/group_search?<name>")]
pub async fn group_search(
    name: String,
    db: Db,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let groups = db.run(move |conn| db::search_groups(conn, &name, 10)).await?;
    let results = groups
        .into_iter()
        .map(|group| {
            json!({
                "group_id": group.group_id,
                "group_name": group.group_name,
                "description": group.description,
                "icon_url": group.icon_url,
                "invite_url": group.invite_url,
            })
        })
        .collect();
    Ok(Json(results))
}
