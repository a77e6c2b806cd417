use crate::coalescer::{COALESCE_WINDOW, CoalesceAction, PbCoalescer};
use crate::context::SubmissionContext;
use crate::dedup;
use crate::error::{SubmissionError, SubmissionKind, SubmissionOutcome};
use crate::groups;
use crate::normalize::{format_time_ms, parse_time_ms};
use crate::notify;
use crate::points;
use crate::processors::{SubmissionFields, player_groups};
use crate::resolver;
use chrono::Utc;
use droptally_db::db;
use droptally_db::models::NewPersonalBest;
use log::{debug, error, warn};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PbSubmission {
    pub player_name: String,
    pub account_hash: String,
    pub npc_name: String,
    pub current_time_ms: Option<i64>,
    pub personal_best_ms: Option<i64>,
    pub team_size: String,
    pub is_new_pb: bool,
    pub unique_id: Option<String>,
    pub used_api: bool,
    pub image_url: Option<String>,
}

impl PbSubmission {
    pub fn from_fields(fields: &SubmissionFields) -> Result<Self, SubmissionError> {
        Ok(Self {
            player_name: fields.required(&["player_name", "player"], "player name")?,
            account_hash: fields.required(&["acc_hash", "account_hash"], "account hash")?,
            npc_name: fields.required(&["npc_name", "boss_name", "source"], "boss name")?,
            current_time_ms: fields
                .get(&["current_time_ms", "kill_time"])
                .and_then(parse_time_ms),
            personal_best_ms: fields
                .get(&["personal_best_ms", "best_time"])
                .and_then(parse_time_ms),
            team_size: fields
                .get(&["team_size"])
                .unwrap_or("Solo")
                .trim()
                .to_string(),
            is_new_pb: fields.get_bool(&["is_new_pb", "is_pb"]),
            unique_id: fields.get(&["guid", "unique_id"]).map(str::to_string),
            used_api: fields.get_bool(&["used_api"]),
            image_url: fields.get(&["image_url"]).map(str::to_string),
        })
    }

    /// The kill time this submission claims: the smaller of the two when
    /// both are present and positive, else whichever is positive.
    pub fn effective_ms(&self) -> Option<i64> {
        let current = self.current_time_ms.filter(|ms| *ms > 0);
        let best = self.personal_best_ms.filter(|ms| *ms > 0);
        match (current, best) {
            (Some(current), Some(best)) => Some(current.min(best)),
            (Some(current), None) => Some(current),
            (None, Some(best)) => Some(best),
            (None, None) => None,
        }
    }
}

/// Entry point from the dispatcher. Raid submissions detour through the
/// coalescer and materialize nothing synchronously.
pub async fn process(
    ctx: &Arc<SubmissionContext>,
    fields: &SubmissionFields,
) -> Result<Option<SubmissionOutcome>, SubmissionError> {
    let sub = PbSubmission::from_fields(fields)?;

    if sub.effective_ms().is_none() {
        // No time was provided; nothing to record.
        return Ok(None);
    }

    if PbCoalescer::is_raid(&sub.npc_name) {
        let player_name = sub.player_name.clone();
        match ctx.coalescer.offer(sub) {
            CoalesceAction::Buffered => {
                debug!("Buffered raid PB for {player_name} into the open window");
            }
            CoalesceAction::Opened => {
                debug!("Opened raid PB window for {player_name}");
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(COALESCE_WINDOW).await;
                    let Some(winner) = ctx.coalescer.take(&player_name) else {
                        debug!("Raid PB window for {player_name} was cancelled");
                        return;
                    };
                    if let Err(err) = process_direct(&ctx, winner).await {
                        error!("Coalesced raid PB for {player_name} failed: {err}");
                    }
                });
            }
        }
        return Ok(None);
    }

    process_direct(ctx, sub).await.map(Some)
}

/// The synchronous PB path, shared by non-raid submissions and the
/// coalescer's fire timer.
pub async fn process_direct(
    ctx: &SubmissionContext,
    sub: PbSubmission,
) -> Result<SubmissionOutcome, SubmissionError> {
    dedup::ensure_can_create(ctx, SubmissionKind::PersonalBest, sub.unique_id.as_deref()).await?;

    let player = resolver::resolve_player_and_auth(ctx, &sub.player_name, &sub.account_hash).await?;
    let player_id = player.player_id;

    let npc = resolver::resolve_npc(ctx, &sub.npc_name, player_id, &sub.player_name).await?;
    let Some((npc_id, npc_name)) = npc else {
        return Err(SubmissionError::unknown_npc(&sub.npc_name));
    };

    let effective_ms = sub
        .effective_ms()
        .ok_or_else(|| SubmissionError::validation("no kill time provided"))?;
    let kill_time_ms = sub.current_time_ms.filter(|ms| *ms > 0).unwrap_or(effective_ms);

    let team_size = sub.team_size.clone();
    let image_url = sub.image_url.clone();
    let unique_id = sub.unique_id.clone();
    let claimed_new_pb = sub.is_new_pb;
    let used_api = sub.used_api;
    let (pb_id, old_time_ms, is_new_pb) = ctx
        .run_db(move |conn| {
            let existing = db::find_personal_best(conn, player_id, npc_id, &team_size)?;
            match existing {
                Some(existing) => {
                    if effective_ms < existing.personal_best_ms {
                        db::update_personal_best(
                            conn,
                            existing.id,
                            effective_ms,
                            kill_time_ms,
                            true,
                            image_url.as_deref(),
                            Utc::now(),
                        )?;
                        Ok((existing.id, Some(existing.personal_best_ms), true))
                    } else {
                        Ok((existing.id, None, false))
                    }
                }
                None => {
                    let created = db::insert_personal_best(
                        conn,
                        &NewPersonalBest {
                            player_id,
                            npc_id,
                            team_size: &team_size,
                            personal_best_ms: effective_ms,
                            kill_time_ms,
                            new_pb: claimed_new_pb,
                            image_url: image_url.as_deref(),
                            used_api,
                            unique_id: unique_id.as_deref(),
                            date_added: Utc::now().naive_utc(),
                        },
                    )?;
                    Ok((created.id, None, claimed_new_pb))
                }
            }
        })
        .await?;

    if !is_new_pb {
        return Ok(SubmissionOutcome::new(SubmissionKind::PersonalBest, Some(pb_id)));
    }

    // A new best at 50+ kill count earns points; an unreachable KC service
    // only costs the award.
    match ctx.wom.player_boss_kills(&sub.player_name, &npc_name).await {
        Ok(Some(kill_count)) if kill_count >= 50 => {
            let source = format!(
                "New Personal Best ({}) at {npc_name}",
                format_time_ms(effective_ms)
            );
            ctx.run_db(move |conn| {
                points::award_points_to_player(
                    conn,
                    player_id,
                    20,
                    &source,
                    Some(points::DEFAULT_EXPIRY_DAYS),
                )
            })
            .await?;
        }
        Ok(_) => {}
        Err(err) => warn!("KC lookup failed for {}: {err}", sub.player_name),
    }

    let data = json!({
        "player_name": sub.player_name,
        "player_id": player_id,
        "pb_id": pb_id,
        "npc_id": npc_id,
        "boss_name": npc_name,
        "time_ms": effective_ms,
        "old_time_ms": old_time_ms,
        "team_size": sub.team_size,
        "kill_time_ms": kill_time_ms,
        "image_url": sub.image_url,
    });

    let mut dm_sent = false;
    for group in player_groups(ctx, player_id).await? {
        let group_id = group.group_id;
        let enabled = ctx
            .run_db(move |conn| Ok(groups::group_notify_enabled(conn, group_id, "notify_pbs")?))
            .await?;
        if !enabled {
            continue;
        }
        notify::enqueue(ctx, "pb", player_id, &data, Some(group_id)).await?;
        if !dm_sent {
            notify::enqueue_dm_if_enabled(ctx, &player, "dm_pbs", "dm_pb", &data).await?;
            dm_sent = true;
        }
    }

    Ok(SubmissionOutcome::new(SubmissionKind::PersonalBest, Some(pb_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_with_times(current: Option<i64>, best: Option<i64>) -> PbSubmission {
        PbSubmission {
            player_name: "Bob".to_string(),
            account_hash: "hash-12345".to_string(),
            npc_name: "Zulrah".to_string(),
            current_time_ms: current,
            personal_best_ms: best,
            team_size: "Solo".to_string(),
            is_new_pb: false,
            unique_id: None,
            used_api: true,
            image_url: None,
        }
    }

    #[test]
    fn effective_time_takes_the_smaller_positive() {
        assert_eq!(sub_with_times(Some(60_000), Some(65_000)).effective_ms(), Some(60_000));
        assert_eq!(sub_with_times(Some(65_000), Some(60_000)).effective_ms(), Some(60_000));
        assert_eq!(sub_with_times(Some(60_000), None).effective_ms(), Some(60_000));
        assert_eq!(sub_with_times(None, Some(65_000)).effective_ms(), Some(65_000));
        assert_eq!(sub_with_times(Some(0), Some(0)).effective_ms(), None);
        assert_eq!(sub_with_times(None, None).effective_ms(), None);
    }
}
