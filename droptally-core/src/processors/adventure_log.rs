use crate::context::SubmissionContext;
use crate::error::{SubmissionError, SubmissionKind, SubmissionOutcome};
use crate::normalize::parse_time_ms;
use crate::processors::SubmissionFields;
use crate::resolver;
use chrono::Utc;
use droptally_db::db;
use droptally_db::models::{NewPersonalBest, NewPlayerPet};
use log::{debug, info};
use std::sync::Arc;

/// One parsed `<boss> - <team_size> : <time>` line.
#[derive(Debug, Clone, PartialEq)]
pub struct AdventureLogPb {
    pub boss_name: String,
    pub team_size: String,
    pub time_ms: i64,
}

/// Parses the adventure-log blob the plugin sends: bracketed,
/// backtick-quoted PB lines separated by newlines or commas.
pub fn parse_pb_lines(raw: &str) -> Vec<AdventureLogPb> {
    raw.replace(['[', ']', '`'], "")
        .split(['\n', ','])
        .filter_map(|line| {
            let line = line.trim();
            let (boss, rest) = line.split_once(" - ")?;
            let (team_size, time) = rest.split_once(" : ")?;
            let time_ms = parse_time_ms(time.trim())?;
            Some(AdventureLogPb {
                boss_name: boss.trim().to_string(),
                team_size: team_size.trim().to_string(),
                time_ms,
            })
        })
        .collect()
}

pub fn parse_pet_ids(raw: &str) -> Vec<i32> {
    raw.replace(['[', ']', '`'], "")
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}

/// Bulk back-fill of personal bests and pets from an account's adventure
/// log. Upserts silently: back-fills never re-enter the notification
/// pipeline.
pub async fn process(
    ctx: &Arc<SubmissionContext>,
    fields: &SubmissionFields,
) -> Result<SubmissionOutcome, SubmissionError> {
    let player_name = fields.required(&["player_name", "player"], "player name")?;
    let account_hash = fields.required(&["acc_hash", "account_hash"], "account hash")?;

    let player = resolver::resolve_player_and_auth(ctx, &player_name, &account_hash).await?;
    let player_id = player.player_id;

    let mut upserted = 0usize;
    if let Some(raw) = fields.get(&["adventure_log"]) {
        let entries = parse_pb_lines(raw);
        debug!("Parsed {} PB lines from {player_name}'s adventure log", entries.len());
        for entry in entries {
            upserted += backfill_pb(ctx, player_id, entry).await? as usize;
        }
    }

    if let Some(raw) = fields.get(&["pet_list"]) {
        let pet_ids = parse_pet_ids(raw);
        ctx.run_db(move |conn| {
            for item_id in pet_ids {
                let Some(item) = db::item_by_id(conn, item_id)? else {
                    continue;
                };
                if db::find_player_pet(conn, player_id, item_id)?.is_none() {
                    db::insert_player_pet(
                        conn,
                        &NewPlayerPet {
                            player_id,
                            item_id,
                            pet_name: &item.item_name,
                            unique_id: None,
                            date_added: Utc::now().naive_utc(),
                        },
                    )?;
                }
            }
            Ok(())
        })
        .await?;
    }

    if upserted > 0 {
        info!("Back-filled {upserted} personal bests for {player_name}");
    }
    Ok(SubmissionOutcome::new(SubmissionKind::AdventureLog, None))
}

/// Returns true when a row was created or improved.
async fn backfill_pb(
    ctx: &SubmissionContext,
    player_id: i32,
    entry: AdventureLogPb,
) -> Result<bool, SubmissionError> {
    ctx.run_db(move |conn| {
        let Some(npc) = db::npc_by_name_fuzzy(conn, &entry.boss_name)? else {
            debug!("No NPC match for adventure log boss {}", entry.boss_name);
            return Ok(false);
        };

        match db::find_personal_best(conn, player_id, npc.npc_id, &entry.team_size)? {
            Some(existing) => {
                if entry.time_ms < existing.personal_best_ms {
                    db::update_personal_best(
                        conn,
                        existing.id,
                        entry.time_ms,
                        entry.time_ms,
                        true,
                        existing.image_url.as_deref(),
                        Utc::now(),
                    )?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => {
                db::insert_personal_best(
                    conn,
                    &NewPersonalBest {
                        player_id,
                        npc_id: npc.npc_id,
                        team_size: &entry.team_size,
                        personal_best_ms: entry.time_ms,
                        kill_time_ms: entry.time_ms,
                        new_pb: true,
                        image_url: None,
                        used_api: false,
                        unique_id: None,
                        date_added: Utc::now().naive_utc(),
                    },
                )?;
                Ok(true)
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backtick_quoted_pb_lines() {
        let raw = "[`Zulrah` - `Solo` : `0:59.40`\n`Theatre of Blood` - `4` : `14:12.00`]";
        let parsed = parse_pb_lines(raw);
        assert_eq!(
            parsed,
            vec![
                AdventureLogPb {
                    boss_name: "Zulrah".to_string(),
                    team_size: "Solo".to_string(),
                    time_ms: 59_400,
                },
                AdventureLogPb {
                    boss_name: "Theatre of Blood".to_string(),
                    team_size: "4".to_string(),
                    time_ms: 852_000,
                },
            ]
        );
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let parsed = parse_pb_lines("not a pb line\nZulrah - Solo : garbage");
        assert!(parsed.is_empty());
    }

    #[test]
    fn parses_pet_id_lists() {
        assert_eq!(parse_pet_ids("[13262, 12921,`13247`]"), vec![13262, 12921, 13247]);
        assert!(parse_pet_ids("[]").is_empty());
    }
}
