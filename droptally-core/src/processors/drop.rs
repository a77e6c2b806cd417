use crate::board::BoardRefresh;
use crate::context::SubmissionContext;
use crate::dedup;
use crate::error::{SubmissionError, SubmissionKind, SubmissionOutcome};
use crate::groups;
use crate::leaderboard::{DropRecord, HIGH_VALUE_THRESHOLD};
use crate::normalize::monthly_partition;
use crate::notify;
use crate::points;
use crate::processors::{SubmissionFields, player_groups};
use crate::resolver;
use chrono::Utc;
use droptally_db::models::NewDrop;
use droptally_db::{GLOBAL_GROUP_ID, db};
use log::{debug, warn};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DropSubmission {
    pub player_name: String,
    pub account_hash: String,
    pub item_id: Option<i32>,
    pub item_name: String,
    pub npc_name: String,
    pub quantity: i64,
    pub value: i64,
    pub kill_count: Option<i64>,
    pub unique_id: Option<String>,
    pub used_api: bool,
    pub image_url: Option<String>,
}

impl DropSubmission {
    pub fn from_fields(fields: &SubmissionFields) -> Result<Self, SubmissionError> {
        Ok(Self {
            player_name: fields.required(&["player_name", "player"], "player name")?,
            account_hash: fields.required(&["acc_hash", "account_hash"], "account hash")?,
            item_id: fields.get_i32(&["item_id", "id"]),
            item_name: fields.required(&["item_name", "item"], "item name")?,
            npc_name: fields.required(&["source", "npc_name"], "npc name")?,
            quantity: fields.get_i64(&["quantity"]).unwrap_or(1).max(1),
            value: fields.get_i64(&["value"]).unwrap_or(0),
            kill_count: fields.get_i64(&["kill_count", "killcount", "kc"]),
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
    let sub = DropSubmission::from_fields(fields)?;

    dedup::ensure_can_create(ctx, SubmissionKind::Drop, sub.unique_id.as_deref()).await?;

    let player = resolver::resolve_player_and_auth(ctx, &sub.player_name, &sub.account_hash).await?;
    let player_id = player.player_id;

    let item = resolver::resolve_item(ctx, sub.item_id, Some(&sub.item_name)).await?;
    let Some(item) = item else {
        let data = json!({
            "item_name": sub.item_name,
            "player_name": sub.player_name,
            "item_id": sub.item_id,
            "npc_name": sub.npc_name,
            "value": sub.value,
        });
        notify::enqueue(ctx, "new_item", player_id, &data, None).await?;
        return Err(SubmissionError::unknown_item(&sub.item_name));
    };

    let npc = resolver::resolve_npc(ctx, &sub.npc_name, player_id, &sub.player_name).await?;
    let Some((npc_id, npc_name)) = npc else {
        return Err(SubmissionError::unknown_npc(&sub.npc_name));
    };

    let effective_unit_value = ctx
        .osrs
        .pricing
        .true_item_value(&sub.item_name, sub.value)
        .await
        .unwrap_or_else(|err| {
            // Pricing being down never blocks ingestion.
            warn!("True-value lookup failed for {}: {err}", sub.item_name);
            sub.value
        });
    let drop_value = effective_unit_value * sub.quantity;

    if drop_value > HIGH_VALUE_THRESHOLD {
        debug!("High-value drop; verifying {} from {npc_name}", sub.item_name);
        let verified = ctx.osrs.semantic.drops(&sub.item_name, &npc_name).await?;
        if !verified {
            return Err(SubmissionError::DropUnverified {
                item: sub.item_name.clone(),
                npc: npc_name,
            });
        }
    }

    let now = Utc::now().naive_utc();
    let image_url = sub.image_url.clone();
    let unique_id = sub.unique_id.clone();
    let used_api = sub.used_api;
    let item_id = item.item_id;
    let quantity = sub.quantity;
    let drop = ctx
        .run_db(move |conn| {
            Ok(db::insert_drop(
                conn,
                &NewDrop {
                    player_id,
                    item_id,
                    npc_id,
                    value: effective_unit_value,
                    quantity: quantity as i32,
                    partition: monthly_partition(now),
                    image_url: image_url.as_deref(),
                    authenticated: true,
                    used_api,
                    unique_id: unique_id.as_deref(),
                    date_added: now,
                },
            )?)
        })
        .await?;

    let member_groups = player_groups(ctx, player_id).await?;
    let group_ids: Vec<i32> = member_groups.iter().map(|g| g.group_id).collect();

    ctx.leaderboard
        .record_drop(&DropRecord::from(&drop), player_id, &group_ids)
        .await?;

    let mut notified_groups: Vec<String> = Vec::new();
    let mut points_awarded = false;
    let mut dm_sent = false;

    for group in &member_groups {
        let group_id = group.group_id;
        let settings = ctx
            .run_db(move |conn| Ok(groups::drop_notify_settings(conn, group_id)?))
            .await?;

        let qualifies = effective_unit_value >= settings.min_value_to_notify
            || (settings.send_stacks && drop_value >= settings.min_value_to_notify);
        if !qualifies {
            continue;
        }

        // Points are awarded exactly once across all qualifying
        // non-global groups.
        if group_id != GLOBAL_GROUP_ID && !points_awarded {
            let divisor = ctx.run_db(|conn| Ok(db::point_divisor(conn)?)).await?;
            if divisor > 0 && drop_value > divisor {
                points_awarded = true;
                let amount = drop_value / divisor;
                let source = format!("Drop: {} from {npc_name}", sub.item_name);
                ctx.run_db(move |conn| {
                    points::award_points_to_player(
                        conn,
                        player_id,
                        amount,
                        &source,
                        Some(points::DEFAULT_EXPIRY_DAYS),
                    )
                })
                .await?;
            }
        }

        let data = json!({
            "drop_id": drop.drop_id,
            "item_name": sub.item_name,
            "npc_name": npc_name,
            "value": effective_unit_value,
            "quantity": sub.quantity,
            "total_value": drop_value,
            "kill_count": sub.kill_count,
            "player_name": sub.player_name,
            "player_id": player_id,
            "image_url": drop.image_url,
        });

        if !dm_sent {
            notify::enqueue_dm_if_enabled(ctx, &player, "dm_drops", "dm_drop", &data).await?;
            dm_sent = true;
        }
        notify::enqueue(ctx, "drop", player_id, &data, Some(group_id)).await?;
        if group_id > GLOBAL_GROUP_ID {
            notified_groups.push(group.group_name.clone());
        }

        // Global boards and groups paying for instant updates get a
        // refresh request; the actor enforces the 10-second spacing.
        let instant = group_id == GLOBAL_GROUP_ID
            || ctx
                .run_db(move |conn| {
                    Ok(db::group_has_active_feature(
                        conn,
                        group_id,
                        "instant_board",
                        Utc::now(),
                    )?)
                })
                .await?;
        if instant {
            ctx.boards.request(BoardRefresh {
                group_id,
                player_id,
                force: true,
            });
        }
    }

    let outcome = SubmissionOutcome::new(SubmissionKind::Drop, Some(drop.drop_id));
    Ok(if notified_groups.is_empty() {
        outcome
    } else {
        outcome.with_notice(format!(
            "Drop processed - a message has been sent to {} for you",
            notified_groups.join(", ")
        ))
    })
}
