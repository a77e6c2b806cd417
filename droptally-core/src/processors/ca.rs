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
use droptally_db::models::NewCombatAchievement;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CaSubmission {
    pub player_name: String,
    pub account_hash: String,
    pub task_name: String,
    pub tier: String,
    pub points_awarded: Option<i64>,
    pub points_total: Option<i64>,
    pub completed_tier: Option<String>,
    pub unique_id: Option<String>,
    pub used_api: bool,
    pub image_url: Option<String>,
}

impl CaSubmission {
    pub fn from_fields(fields: &SubmissionFields) -> Result<Self, SubmissionError> {
        Ok(Self {
            player_name: fields.required(&["player_name", "player"], "player name")?,
            account_hash: fields.required(&["acc_hash", "account_hash"], "account hash")?,
            task_name: fields.required(&["task", "task_name"], "task name")?,
            tier: fields.required(&["tier"], "tier")?,
            points_awarded: fields.get_i64(&["points"]),
            points_total: fields.get_i64(&["total_points"]),
            completed_tier: fields.get(&["completed"]).map(str::to_string),
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
    let sub = CaSubmission::from_fields(fields)?;

    dedup::ensure_can_create(ctx, SubmissionKind::CombatAchievement, sub.unique_id.as_deref())
        .await?;

    let player = resolver::resolve_player_and_auth(ctx, &sub.player_name, &sub.account_hash).await?;
    let player_id = player.player_id;

    let task_name = sub.task_name.clone();
    let image_url = sub.image_url.clone();
    let unique_id = sub.unique_id.clone();
    let used_api = sub.used_api;
    let (ca_id, is_new) = ctx
        .run_db(move |conn| {
            if let Some(existing) = db::find_combat_achievement(conn, player_id, &task_name)? {
                // Task already on record; the resubmission is a no-op.
                return Ok((existing.id, false));
            }
            let created = db::insert_combat_achievement(
                conn,
                &NewCombatAchievement {
                    player_id,
                    task_name: &task_name,
                    image_url: image_url.as_deref(),
                    used_api,
                    unique_id: unique_id.as_deref(),
                    date_added: Utc::now().naive_utc(),
                },
            )?;
            Ok((created.id, true))
        })
        .await?;

    if !is_new {
        return Ok(SubmissionOutcome::new(
            SubmissionKind::CombatAchievement,
            Some(ca_id),
        ));
    }

    let tier_points = groups::ca_tier_points(&sub.tier);
    let source = format!("Combat Achievement: {}", sub.task_name);
    ctx.run_db(move |conn| {
        points::award_points_to_player(
            conn,
            player_id,
            tier_points,
            &source,
            Some(points::DEFAULT_EXPIRY_DAYS),
        )
    })
    .await?;

    let data = json!({
        "player_name": sub.player_name,
        "player_id": player_id,
        "task_name": sub.task_name,
        "tier": sub.tier,
        "points_awarded": sub.points_awarded,
        "points_total": sub.points_total,
        "completed_tier": sub.completed_tier,
        "image_url": sub.image_url,
    });

    let mut dm_sent = false;
    for group in player_groups(ctx, player_id).await? {
        let group_id = group.group_id;
        let (enabled, min_tier) = ctx
            .run_db(move |conn| {
                let enabled = groups::group_notify_enabled(conn, group_id, "notify_cas")?;
                let min_tier = db::group_config_value(conn, group_id, "min_ca_tier_to_notify")?;
                Ok((enabled, min_tier))
            })
            .await?;

        if !enabled || !groups::ca_tier_allows(min_tier.as_deref(), &sub.tier, group_id) {
            continue;
        }

        if !dm_sent {
            notify::enqueue_dm_if_enabled(ctx, &player, "dm_cas", "dm_ca", &data).await?;
            dm_sent = true;
        }
        notify::enqueue(ctx, "ca", player_id, &data, Some(group_id)).await?;
    }

    Ok(SubmissionOutcome::new(
        SubmissionKind::CombatAchievement,
        Some(ca_id),
    ))
}
