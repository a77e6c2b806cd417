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
use droptally_db::models::NewPlayerPet;
use log::debug;
use serde_json::json;
use std::sync::Arc;

const PET_POINTS: i64 = 50;

#[derive(Debug, Clone)]
pub struct PetSubmission {
    pub player_name: String,
    pub account_hash: String,
    pub pet_name: String,
    pub source_npc: Option<String>,
    pub kill_count: Option<i64>,
    pub milestone: Option<String>,
    pub duplicate: bool,
    pub previously_owned: Option<bool>,
    pub game_message: Option<String>,
    pub unique_id: Option<String>,
    pub image_url: Option<String>,
}

impl PetSubmission {
    pub fn from_fields(fields: &SubmissionFields) -> Result<Self, SubmissionError> {
        Ok(Self {
            player_name: fields.required(&["player_name", "player"], "player name")?,
            account_hash: fields.required(&["acc_hash", "account_hash"], "account hash")?,
            pet_name: fields.required(&["pet_name"], "pet name")?,
            source_npc: fields.get(&["source", "npc_name"]).map(str::to_string),
            kill_count: fields.get_i64(&["killcount", "kc"]),
            milestone: fields.get(&["milestone"]).map(str::to_string),
            duplicate: fields.get_bool(&["duplicate"]),
            previously_owned: fields
                .get(&["previously_owned"])
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1")),
            game_message: fields.get(&["game_message"]).map(str::to_string),
            unique_id: fields.get(&["guid", "unique_id"]).map(str::to_string),
            image_url: fields.get(&["image_url"]).map(str::to_string),
        })
    }
}

pub async fn process(
    ctx: &Arc<SubmissionContext>,
    fields: &SubmissionFields,
) -> Result<SubmissionOutcome, SubmissionError> {
    let sub = PetSubmission::from_fields(fields)?;

    dedup::ensure_can_create(ctx, SubmissionKind::Pet, sub.unique_id.as_deref()).await?;

    let player = resolver::resolve_player_and_auth(ctx, &sub.player_name, &sub.account_hash).await?;
    let player_id = player.player_id;

    // Pets are lenient about item resolution: an unknown pet item skips the
    // DB row but still notifies.
    let pet_item = resolver::resolve_item(ctx, None, Some(&sub.pet_name)).await?;
    if pet_item.is_none() {
        debug!("Pet item {} is unknown; continuing without a row", sub.pet_name);
    }

    let mut npc_id = None;
    let mut npc_name = sub.source_npc.clone();
    if let Some(source) = &sub.source_npc {
        if let Some((id, name)) = resolver::resolve_npc(ctx, source, player_id, &sub.player_name).await? {
            npc_id = Some(id);
            npc_name = Some(name);
        }
    }

    let mut pet_id = None;
    let mut is_new_pet = false;
    if let Some(item) = &pet_item {
        let item_id = item.item_id;
        let pet_name = sub.pet_name.clone();
        let unique_id = sub.unique_id.clone();
        let (id, is_new) = ctx
            .run_db(move |conn| {
                if let Some(existing) = db::find_player_pet(conn, player_id, item_id)? {
                    return Ok((existing.id, false));
                }
                let created = db::insert_player_pet(
                    conn,
                    &NewPlayerPet {
                        player_id,
                        item_id,
                        pet_name: &pet_name,
                        unique_id: unique_id.as_deref(),
                        date_added: Utc::now().naive_utc(),
                    },
                )?;
                Ok((created.id, true))
            })
            .await?;
        pet_id = Some(id);
        is_new_pet = is_new;
    }

    // Only the first acquisition earns points.
    if is_new_pet {
        let source = format!("Pet: {}", sub.pet_name);
        ctx.run_db(move |conn| {
            points::award_points_to_player(
                conn,
                player_id,
                PET_POINTS,
                &source,
                Some(points::DEFAULT_EXPIRY_DAYS),
            )
        })
        .await?;
    }

    let should_notify = is_new_pet || sub.duplicate;
    if should_notify {
        let data = json!({
            "player_name": sub.player_name,
            "player_id": player_id,
            "pet_name": sub.pet_name,
            "source": sub.source_npc,
            "npc_name": npc_name,
            "npc_id": npc_id,
            "killcount": sub.kill_count,
            "milestone": sub.milestone,
            "duplicate": sub.duplicate,
            "previously_owned": sub.previously_owned,
            "game_message": sub.game_message,
            "image_url": sub.image_url,
            "item_id": pet_item.as_ref().map(|i| i.item_id),
            "is_new_pet": is_new_pet,
        });

        let mut dm_sent = false;
        for group in player_groups(ctx, player_id).await? {
            let group_id = group.group_id;
            let enabled = ctx
                .run_db(move |conn| Ok(groups::group_notify_enabled(conn, group_id, "notify_pets")?))
                .await?;
            if !enabled {
                continue;
            }
            if !dm_sent {
                notify::enqueue_dm_if_enabled(ctx, &player, "dm_pets", "dm_pet", &data).await?;
                dm_sent = true;
            }
            notify::enqueue(ctx, "pet", player_id, &data, Some(group_id)).await?;
        }
    }

    Ok(SubmissionOutcome::new(SubmissionKind::Pet, pet_id))
}
