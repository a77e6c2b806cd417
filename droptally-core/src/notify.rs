use crate::context::SubmissionContext;
use crate::error::SubmissionError;
use chrono::Utc;
use droptally_db::db;
use droptally_db::models::{DbPlayer, NewNotification};
use hashbrown::HashMap;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Mutex;

const WINDOW_CAPACITY: usize = 100;

/// Per-group windows of recently enqueued payload hashes. Suppresses the
/// duplicate rows a burst of identical submissions would otherwise create
/// before the DB unique index even sees them. Group key 0 holds groupless
/// notifications.
pub struct NotificationDeduper {
    windows: Mutex<HashMap<i32, VecDeque<String>>>,
}

impl Default for NotificationDeduper {
    fn default() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl NotificationDeduper {
    /// Records the hash in the group's window. Returns false when the same
    /// payload was recently enqueued for this group.
    pub fn observe(&self, group_id: Option<i32>, payload_hash: &str) -> bool {
        let mut windows = self.windows.lock().expect("notification window poisoned");
        let window = windows.entry(group_id.unwrap_or(0)).or_default();
        if window.iter().any(|seen| seen == payload_hash) {
            return false;
        }
        if window.len() >= WINDOW_CAPACITY {
            window.pop_front();
        }
        window.push_back(payload_hash.to_string());
        true
    }
}

pub fn payload_hash(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// Enqueues a pending notification, deduplicated by payload hash within the
/// group's window and backstopped by the DB unique index. Returns the new
/// row id, or None when suppressed.
pub async fn enqueue(
    ctx: &SubmissionContext,
    kind: &str,
    player_id: i32,
    data: &serde_json::Value,
    group_id: Option<i32>,
) -> Result<Option<i64>, SubmissionError> {
    let mut data = data.clone();
    if !ctx.config.discord_message_footer.is_empty() {
        if let Some(object) = data.as_object_mut() {
            object
                .entry("footer")
                .or_insert_with(|| ctx.config.discord_message_footer.clone().into());
        }
    }
    let payload = serde_json::to_string(&data)
        .map_err(|e| SubmissionError::internal(format!("unserializable payload: {e}")))?;

    if !ctx.notifications.observe(group_id, &payload_hash(&payload)) {
        debug!("Suppressing repeat {kind} notification for group {group_id:?}");
        return Ok(None);
    }

    let queue_length = ctx.config.queue_length;
    let kind = kind.to_string();
    ctx.run_db(move |conn| {
        let pending = db::pending_notification_count(conn)?;
        if pending > queue_length {
            warn!("Notification queue depth {pending} exceeds advisory cap {queue_length}");
        }
        let id = db::insert_notification(
            conn,
            &NewNotification {
                notification_type: &kind,
                player_id,
                group_id,
                data: &payload,
                status: "pending",
                created_at: Utc::now().naive_utc(),
            },
        )?;
        Ok(id)
    })
    .await
}

/// Enqueues a DM notification when the player's owning user has opted in to
/// the given preference key. DM notifications carry no group.
pub async fn enqueue_dm_if_enabled(
    ctx: &SubmissionContext,
    player: &DbPlayer,
    preference_key: &str,
    kind: &str,
    data: &serde_json::Value,
) -> Result<(), SubmissionError> {
    let Some(user_id) = player.user_id else {
        return Ok(());
    };

    let key = preference_key.to_string();
    let enabled = ctx
        .run_db(move |conn| {
            let value = db::user_config_value(conn, user_id, &key)?;
            Ok(matches!(value.as_deref(), Some("true") | Some("1")))
        })
        .await?;

    if enabled {
        enqueue(ctx, kind, player.player_id, data, None).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_payloads_are_suppressed_per_group() {
        let deduper = NotificationDeduper::default();
        let hash = payload_hash("{\"drop_id\":1}");
        assert!(deduper.observe(Some(5), &hash));
        assert!(!deduper.observe(Some(5), &hash));
        // A different group has its own window.
        assert!(deduper.observe(Some(6), &hash));
        // So do groupless notifications.
        assert!(deduper.observe(None, &hash));
    }

    #[test]
    fn windows_are_bounded() {
        let deduper = NotificationDeduper::default();
        for i in 0..WINDOW_CAPACITY {
            assert!(deduper.observe(Some(1), &payload_hash(&format!("p{i}"))));
        }
        assert!(deduper.observe(Some(1), &payload_hash("overflow")));
        // p0 has been evicted and may be enqueued again.
        assert!(deduper.observe(Some(1), &payload_hash("p0")));
    }
}
