use crate::context::SubmissionContext;
use crate::dedup;
use crate::error::{SubmissionError, SubmissionKind, SubmissionOutcome};
use crate::groups;
use crate::notify;
use crate::points;
use crate::processors::{SubmissionFields, player_groups};
use crate::resolver;
use chrono::Utc;
use droptally_db::db;
use droptally_db::models::NewCollectionLogEntry;
use serde_json::json;
use std::sync::Arc;

const CLOG_POINTS: i64 = 5;

#[derive(Debug, Clone)]
pub struct ClogSubmission {
    pub player_name: String,
    pub account_hash: String,
    pub item_name: String,
    pub source_npc: String,
    pub reported_slots: Option<i32>,
    pub kill_count: Option<i64>,
    pub unique_id: Option<String>,
    pub used_api: bool,
    pub image_url: Option<String>,
}

impl ClogSubmission {
    pub fn from_fields(fields: &SubmissionFields) -> Result<Self, SubmissionError> {
        Ok(Self {
            player_name: fields.required(&["player_name", "player"], "player name")?,
            account_hash: fields.required(&["acc_hash", "account_hash"], "account hash")?,
            item_name: fields.required(&["item_name", "item"], "item name")?,
            source_npc: fields.required(&["source", "npc_name"], "source npc")?,
            reported_slots: fields.get_i32(&["reported_slots", "slots"]),
            kill_count: fields.get_i64(&["kc", "killcount"]),
            unique_id: fields.get(&["guid", "unique_id"]).map(str::to_string),
            used_api: fields.get_bool(&["used_api"]),
            image_url: fields.get(&["image_url"]).map(str::to_string),
        })
    }
}

pub async fn process(
    ctx: &Arc<SubmissionContext>,
    fields: &SubmissionFields,
) -> Result<SubmissionOutcome, SubmissionError> {
    let sub = ClogSubmission::from_fields(fields)?;

    dedup::ensure_can_create(ctx, SubmissionKind::CollectionLog, sub.unique_id.as_deref()).await?;

    let player = resolver::resolve_player_and_auth(ctx, &sub.player_name, &sub.account_hash).await?;
    let player_id = player.player_id;

    // The item must be confirmable externally; a log slot for an item the
    // wiki has never heard of is rejected.
    let item = resolver::resolve_item(ctx, None, Some(&sub.item_name)).await?;
    let Some(item) = item else {
        return Err(SubmissionError::unknown_item(&sub.item_name));
    };

    let npc = resolver::resolve_npc(ctx, &sub.source_npc, player_id, &sub.player_name).await?;
    let Some((npc_id, npc_name)) = npc else {
        return Err(SubmissionError::unknown_npc(&sub.source_npc));
    };

    let item_id = item.item_id;
    let reported_slots = sub.reported_slots;
    let image_url = sub.image_url.clone();
    let unique_id = sub.unique_id.clone();
    let used_api = sub.used_api;
    let (log_id, image_url, is_new) = ctx
        .run_db(move |conn| {
            if let Some(existing) = db::find_collection_log_entry(conn, player_id, item_id)? {
                return Ok((existing.log_id, existing.image_url, false));
            }
            let created = db::insert_collection_log_entry(
                conn,
                &NewCollectionLogEntry {
                    player_id,
                    item_id,
                    npc_id,
                    reported_slots,
                    image_url: image_url.as_deref(),
                    used_api,
                    unique_id: unique_id.as_deref(),
                    date_added: Utc::now().naive_utc(),
                },
            )?;
            Ok((created.log_id, created.image_url, true))
        })
        .await?;

    if !is_new {
        return Ok(SubmissionOutcome::new(
            SubmissionKind::CollectionLog,
            Some(log_id),
        ));
    }

    let source = format!("Collection Log slot: {}", sub.item_name);
    ctx.run_db(move |conn| {
        points::award_points_to_player(
            conn,
            player_id,
            CLOG_POINTS,
            &source,
            Some(points::DEFAULT_EXPIRY_DAYS),
        )
    })
    .await?;

    let data = json!({
        "player_name": sub.player_name,
        "player_id": player_id,
        "item_name": sub.item_name,
        "npc_name": npc_name,
        "image_url": image_url,
        "kc_received": sub.kill_count,
        "item_id": item_id,
    });

    let mut dm_sent = false;
    for group in player_groups(ctx, player_id).await? {
        let group_id = group.group_id;
        let enabled = ctx
            .run_db(move |conn| Ok(groups::group_notify_enabled(conn, group_id, "notify_clogs")?))
            .await?;
        if !enabled {
            continue;
        }
        notify::enqueue(ctx, "clog", player_id, &data, Some(group_id)).await?;
        if !dm_sent {
            notify::enqueue_dm_if_enabled(ctx, &player, "dm_clogs", "dm_clog", &data).await?;
            dm_sent = true;
        }
    }

    Ok(SubmissionOutcome::new(
        SubmissionKind::CollectionLog,
        Some(log_id),
    ))
}
