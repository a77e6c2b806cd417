use crate::context::SubmissionContext;
use crate::error::{SubmissionError, SubmissionKind};
use chrono::{Duration, Utc};
use droptally_db::db;
use std::collections::VecDeque;
use std::sync::Mutex;

const RING_CAPACITY: usize = 1000;
const DB_WINDOW_HOURS: i64 = 1;

/// Per-kind FIFO rings of recently seen unique ids. The ring absorbs hot
/// replays without a DB round trip; the DB window check behind it survives
/// restarts.
pub struct DedupCache {
    rings: [Mutex<VecDeque<String>>; 5],
}

impl Default for DedupCache {
    fn default() -> Self {
        Self {
            rings: std::array::from_fn(|_| Mutex::new(VecDeque::with_capacity(RING_CAPACITY))),
        }
    }
}

fn ring_index(kind: SubmissionKind) -> Option<usize> {
    match kind {
        SubmissionKind::Drop => Some(0),
        SubmissionKind::PersonalBest => Some(1),
        SubmissionKind::CombatAchievement => Some(2),
        SubmissionKind::CollectionLog => Some(3),
        SubmissionKind::Pet => Some(4),
        SubmissionKind::AdventureLog => None,
    }
}

impl DedupCache {
    /// Records the id in the ring. Returns false when the id was already
    /// present (a replay).
    pub fn observe(&self, kind: SubmissionKind, unique_id: &str) -> bool {
        let Some(index) = ring_index(kind) else {
            return true;
        };
        let mut ring = self.rings[index].lock().expect("dedup ring poisoned");
        if ring.iter().any(|seen| seen == unique_id) {
            return false;
        }
        if ring.len() >= RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(unique_id.to_string());
        true
    }
}

/// The full dedup gate: ring first, then the one-hour DB window. Errors with
/// `Duplicate` when the submission has been seen.
pub async fn ensure_can_create(
    ctx: &SubmissionContext,
    kind: SubmissionKind,
    unique_id: Option<&str>,
) -> Result<(), SubmissionError> {
    let Some(unique_id) = unique_id else {
        // Nothing to deduplicate on; old plugin builds omit the uuid.
        return Ok(());
    };

    if !ctx.dedup.observe(kind, unique_id) {
        return Err(SubmissionError::Duplicate);
    }

    let since = Utc::now() - Duration::hours(DB_WINDOW_HOURS);
    let unique_id = unique_id.to_string();
    let exists = ctx
        .run_db(move |conn| {
            let exists = match kind {
                SubmissionKind::Drop => db::recent_drop_with_unique_id(conn, &unique_id, since)?,
                SubmissionKind::PersonalBest => {
                    db::recent_pb_with_unique_id(conn, &unique_id, since)?
                }
                SubmissionKind::CombatAchievement => {
                    db::recent_ca_with_unique_id(conn, &unique_id, since)?
                }
                SubmissionKind::CollectionLog => {
                    db::recent_clog_with_unique_id(conn, &unique_id, since)?
                }
                SubmissionKind::Pet => db::recent_pet_with_unique_id(conn, &unique_id, since)?,
                SubmissionKind::AdventureLog => false,
            };
            Ok(exists)
        })
        .await?;

    if exists {
        return Err(SubmissionError::Duplicate);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_observation_of_an_id_is_a_replay() {
        let cache = DedupCache::default();
        assert!(cache.observe(SubmissionKind::Drop, "u1"));
        assert!(!cache.observe(SubmissionKind::Drop, "u1"));
        // Same id under a different kind is a different submission.
        assert!(cache.observe(SubmissionKind::Pet, "u1"));
    }

    #[test]
    fn ring_evicts_oldest_at_capacity() {
        let cache = DedupCache::default();
        for i in 0..RING_CAPACITY {
            assert!(cache.observe(SubmissionKind::Drop, &format!("u{i}")));
        }
        // Capacity reached; inserting one more evicts u0.
        assert!(cache.observe(SubmissionKind::Drop, "overflow"));
        assert!(cache.observe(SubmissionKind::Drop, "u0"));
        assert!(!cache.observe(SubmissionKind::Drop, "overflow"));
    }
}
