use crate::api::ApiError;
use chrono::Utc;
use droptally_core::processors::{self, SubmissionFields};
use droptally_core::{SubmissionContext, SubmissionOutcome};
use droptally_db::db;
use log::{debug, warn};
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, post};
use serde::Serialize;
use std::sync::Arc;

#[derive(rocket::FromForm)]
pub struct WebhookUpload<'r> {
    pub payload_json: &'r str,
    pub file: Option<TempFile<'r>>,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[post("/webhook", data = "<form>", format = "multipart/form-data")]
pub async fn webhook(
    form: Form<WebhookUpload<'_>>,
    ctx: &State<Arc<SubmissionContext>>,
) -> Result<Json<WebhookResponse>, ApiError> {
    handle_upload(form.into_inner(), ctx).await
}

/// `/submit` is a plugin-compatibility alias of `/webhook`.
#[post("/submit", data = "<form>", format = "multipart/form-data")]
pub async fn submit(
    form: Form<WebhookUpload<'_>>,
    ctx: &State<Arc<SubmissionContext>>,
) -> Result<Json<WebhookResponse>, ApiError> {
    handle_upload(form.into_inner(), ctx).await
}

#[post("/webhook", rank = 2)]
pub fn webhook_not_multipart() -> Status {
    Status::UnsupportedMediaType
}

#[post("/submit", rank = 2)]
pub fn submit_not_multipart() -> Status {
    Status::UnsupportedMediaType
}

async fn handle_upload(
    mut upload: WebhookUpload<'_>,
    ctx: &State<Arc<SubmissionContext>>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let payload: serde_json::Value = serde_json::from_str(upload.payload_json)
        .map_err(|e| ApiError::bad_request(format!("invalid payload_json: {e}")))?;

    let embeds = payload
        .get("embeds")
        .and_then(|e| e.as_array())
        .filter(|embeds| !embeds.is_empty())
        .ok_or_else(|| ApiError::bad_request("no embeds found in payload"))?;

    let mut items: Vec<SubmissionFields> = embeds
        .iter()
        .map(SubmissionFields::from_embed)
        .collect();

    // Save the uploaded screenshot (if any) before dispatch so every
    // processed item carries its external URL. A staging failure degrades
    // to an imageless submission instead of rejecting the batch.
    if let Some(file) = upload.file.as_mut() {
        match stage_image(ctx, file, &items).await {
            Ok(Some(url)) => {
                for item in &mut items {
                    item.insert("image_url", url.clone());
                }
            }
            Ok(None) => {}
            Err(err) => warn!("Failed to stage uploaded image: {err}"),
        }
    }

    let mut last_outcome: Option<SubmissionOutcome> = None;
    for mut item in items {
        item.insert("used_api", "true".to_string());
        if let Some(outcome) = processors::dispatch_embed(ctx, item).await? {
            debug!("Processed {} submission (id {:?})", outcome.kind, outcome.id);
            last_outcome = Some(outcome);
        }
    }

    let notice = last_outcome.and_then(|outcome| outcome.notice);
    Ok(Json(WebhookResponse {
        message: "Webhook data processed successfully".to_string(),
        notice,
    }))
}

/// Writes the uploaded file into the attachment store under the submitting
/// player's directory. Returns the external URL, or None when the player
/// is unknown (nothing to key the path on).
async fn stage_image(
    ctx: &SubmissionContext,
    file: &mut TempFile<'_>,
    items: &[SubmissionFields],
) -> Result<Option<String>, ApiError> {
    let Some(first) = items.first() else {
        return Ok(None);
    };
    let Some(player_name) = first.get(&["player_name", "player"]).map(str::to_string) else {
        return Ok(None);
    };

    let player = ctx
        .run_db(move |conn| Ok(db::player_by_name(conn, &player_name)?))
        .await?;
    let Some(wom_id) = player.and_then(|p| p.wom_id) else {
        debug!("No known player for uploaded image; skipping staging");
        return Ok(None);
    };

    let kind = canonical_kind(first.get(&["type"]).unwrap_or("drop"));
    let subfolder = first.get(&["source", "npc_name", "boss_name"]).map(str::to_string);
    let entry_name = first
        .get(&["item_name", "item", "task", "pet_name", "npc_name"])
        .unwrap_or(kind)
        .to_string();
    let content_type = file.content_type().map(|ct| ct.to_string());

    // TempFile contents may be in-memory or on disk; copy to a scratch path
    // to get bytes either way.
    let scratch = std::env::temp_dir().join(format!(
        "droptally-upload-{}-{}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    file.copy_to(&scratch)
        .await
        .map_err(|e| ApiError::bad_request(format!("unreadable upload: {e}")))?;
    let bytes = tokio::fs::read(&scratch)
        .await
        .map_err(|e| ApiError::bad_request(format!("unreadable upload: {e}")))?;
    tokio::fs::remove_file(&scratch).await.ok();

    let saved = ctx
        .attachments
        .save(
            wom_id,
            kind,
            subfolder.as_deref(),
            &entry_name,
            Utc::now().timestamp(),
            content_type.as_deref(),
            &bytes,
        )
        .await
        .map_err(|e| ApiError::bad_request(format!("attachment store error: {e}")))?;

    Ok(Some(saved.url))
}

fn canonical_kind(submission_type: &str) -> &'static str {
    match submission_type {
        "drop" | "other" | "npc" => "drop",
        "personal_best" | "kill_time" | "npc_kill" => "pb",
        "combat_achievement" => "ca",
        "collection_log" => "clog",
        "pet" => "pet",
        _ => "drop",
    }
}
