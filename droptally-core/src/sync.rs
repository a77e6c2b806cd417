use crate::context::SubmissionContext;
use crate::error::SubmissionError;
use crate::normalize::display_names_equivalent;
use crate::notify;
use chrono::Utc;
use droptally_db::models::DbGroup;
use droptally_db::{GLOBAL_GROUP_ID, db};
use log::{info, warn};
use osrs_api::WomGroupMember;
use serde_json::json;

/// The membership changes one reconciliation pass should apply, in player
/// ids. Computed purely from the local and external views.
#[derive(Debug, Default, PartialEq)]
pub struct MembershipPlan {
    pub add: Vec<i32>,
    pub remove: Vec<i32>,
}

/// Diffs local members against the external roster. An empty roster plans
/// nothing: transient upstream failures must never mass-unlink a group.
pub fn plan_membership_changes(
    local: &[(i32, Option<i32>)],
    known_by_wom_id: &[(i32, i32)],
    roster: &[i32],
) -> MembershipPlan {
    if roster.is_empty() {
        return MembershipPlan::default();
    }

    let local_player_ids: Vec<i32> = local.iter().map(|(player_id, _)| *player_id).collect();
    let add = known_by_wom_id
        .iter()
        .filter(|(_, wom_id)| roster.contains(wom_id))
        .map(|(player_id, _)| *player_id)
        .filter(|player_id| !local_player_ids.contains(player_id))
        .collect();

    let remove = local
        .iter()
        .filter_map(|(player_id, wom_id)| match wom_id {
            // Members we can't tie to an external id are left alone.
            None => None,
            Some(wom_id) if roster.contains(wom_id) => None,
            Some(_) => Some(*player_id),
        })
        .collect();

    MembershipPlan { add, remove }
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
}

/// Reconciles one group's membership against the external roster. When
/// `silent` is false, each change enqueues a group notification.
pub async fn sync_group(
    ctx: &SubmissionContext,
    group: &DbGroup,
    silent: bool,
) -> Result<SyncReport, SubmissionError> {
    let Some(wom_group_id) = group.wom_group_id else {
        return Ok(SyncReport::default());
    };

    let roster = match ctx.wom.group_members(wom_group_id).await {
        Ok(roster) => roster,
        Err(err) => {
            warn!(
                "Roster fetch failed for group {} ({err}); skipping removals this pass",
                group.group_name
            );
            return Ok(SyncReport::default());
        }
    };
    if roster.is_empty() {
        warn!(
            "Empty roster for group {}; skipping removals this pass",
            group.group_name
        );
        return Ok(SyncReport::default());
    }

    refresh_drifted_names(ctx, &roster).await?;

    let group_id = group.group_id;
    let roster_ids: Vec<i32> = roster.iter().map(|m| m.wom_id).collect();
    let plan = ctx
        .run_db(move |conn| {
            let local: Vec<(i32, Option<i32>)> = db::group_members(conn, group_id)?
                .into_iter()
                .map(|p| (p.player_id, p.wom_id))
                .collect();
            let mut known = Vec::with_capacity(roster_ids.len());
            for wom_id in &roster_ids {
                if let Some(player) = db::player_by_wom_id(conn, *wom_id)? {
                    known.push((player.player_id, *wom_id));
                }
            }
            Ok(plan_membership_changes(&local, &known, &roster_ids))
        })
        .await?;

    let report = SyncReport {
        added: plan.add.len(),
        removed: plan.remove.len(),
    };

    for player_id in plan.add {
        ctx.run_db(move |conn| Ok(db::add_membership(conn, player_id, group_id)?))
            .await?;
        if !silent {
            let data = json!({"event": "player_added", "player_id": player_id, "group_id": group_id});
            notify::enqueue(ctx, "group_member_added", player_id, &data, Some(group_id)).await?;
        }
    }
    for player_id in plan.remove {
        ctx.run_db(move |conn| Ok(db::remove_membership(conn, player_id, group_id)?))
            .await?;
        if !silent {
            let data =
                json!({"event": "player_removed", "player_id": player_id, "group_id": group_id});
            notify::enqueue(ctx, "group_member_removed", player_id, &data, Some(group_id)).await?;
        }
    }

    if report.added > 0 || report.removed > 0 {
        info!(
            "Synced group {}: +{} -{}",
            group.group_name, report.added, report.removed
        );
    }
    ctx.run_db(move |conn| Ok(db::touch_group(conn, group_id, Utc::now())?))
        .await?;

    Ok(report)
}

/// Runs a reconciliation pass over every group with an external roster,
/// then re-asserts the global-group invariant for the touched players.
pub async fn sync_all_groups(ctx: &SubmissionContext, silent: bool) -> Result<(), SubmissionError> {
    let groups = ctx
        .run_db(|conn| Ok(db::groups_with_external_roster(conn)?))
        .await?;

    for group in groups {
        if group.group_id == GLOBAL_GROUP_ID {
            continue;
        }
        if let Err(err) = sync_group(ctx, &group, silent).await {
            warn!("Group sync failed for {}: {err}", group.group_name);
        }
    }

    // Every player is a member of the global group, no matter what the
    // external rosters say.
    ctx.run_db(|conn| {
        for player_id in db::all_player_ids(conn)? {
            db::ensure_global_membership(conn, player_id)?;
        }
        Ok(())
    })
    .await?;

    Ok(())
}

/// Roster display names that drift beyond separator equivalence refresh the
/// local spelling.
async fn refresh_drifted_names(
    ctx: &SubmissionContext,
    roster: &[WomGroupMember],
) -> Result<(), SubmissionError> {
    let updates: Vec<(i32, String)> = roster
        .iter()
        .map(|m| (m.wom_id, m.display_name.clone()))
        .collect();
    ctx.run_db(move |conn| {
        for (wom_id, roster_name) in updates {
            let Some(player) = db::player_by_wom_id(conn, wom_id)? else {
                continue;
            };
            if player.player_name != roster_name
                && !display_names_equivalent(&player.player_name, &roster_name)
            {
                info!(
                    "Roster rename: {} is now {roster_name}",
                    player.player_name
                );
                db::update_player_name(conn, player.player_id, &roster_name, Utc::now())?;
            }
        }
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roster_plans_no_removals() {
        let local = vec![(1, Some(100)), (2, Some(200))];
        let plan = plan_membership_changes(&local, &[], &[]);
        assert_eq!(plan, MembershipPlan::default());
    }

    #[test]
    fn plans_adds_and_removals_from_the_roster() {
        // Players 1 and 2 are members; the roster keeps 100, drops 200, and
        // introduces 300 (which is player 3 locally).
        let local = vec![(1, Some(100)), (2, Some(200))];
        let known = vec![(1, 100), (3, 300)];
        let plan = plan_membership_changes(&local, &known, &[100, 300]);
        assert_eq!(plan.add, vec![3]);
        assert_eq!(plan.remove, vec![2]);
    }

    #[test]
    fn members_without_external_ids_are_never_removed() {
        let local = vec![(1, None), (2, Some(200))];
        let plan = plan_membership_changes(&local, &[], &[999]);
        assert_eq!(plan.remove, vec![2]);
        assert!(plan.add.is_empty());
    }
}
