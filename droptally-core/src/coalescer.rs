use crate::processors::pb::PbSubmission;
use hashbrown::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a window collects team submissions before firing.
pub const COALESCE_WINDOW: Duration = Duration::from_secs(10);

/// Backstop for windows whose fire task never ran (e.g. lost to a crash
/// mid-window). Normal windows are consumed by `take` at fire time.
const STALE_AFTER: Duration = Duration::from_secs(20);

struct Window {
    submissions: Vec<PbSubmission>,
    opened_at: Instant,
}

/// What `offer` tells the caller to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceAction {
    /// First raid PB for this player: schedule the fire timer.
    Opened,
    /// A window is already collecting; nothing to schedule.
    Buffered,
}

/// Team-raid PBs arrive near-simultaneously from every client in the team.
/// One window per player collects them for ten seconds; at fire time the
/// submission with the numerically largest team size wins.
pub struct PbCoalescer {
    windows: Mutex<HashMap<String, Window>>,
}

impl Default for PbCoalescer {
    fn default() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl PbCoalescer {
    /// Only Tombs of Amascut and Theatre of Blood submissions coalesce.
    pub fn is_raid(npc_name: &str) -> bool {
        npc_name.contains("Amascut") || npc_name.contains("Theatre of Blood")
    }

    pub fn offer(&self, submission: PbSubmission) -> CoalesceAction {
        let mut windows = self.windows.lock().expect("coalescer poisoned");
        windows.retain(|_, w| w.opened_at.elapsed() < STALE_AFTER);

        let key = submission.player_name.clone();
        match windows.get_mut(&key) {
            Some(window) => {
                window.submissions.push(submission);
                CoalesceAction::Buffered
            }
            None => {
                windows.insert(
                    key,
                    Window {
                        submissions: vec![submission],
                        opened_at: Instant::now(),
                    },
                );
                CoalesceAction::Opened
            }
        }
    }

    /// Consumes the player's window, yielding the winning submission.
    pub fn take(&self, player_name: &str) -> Option<PbSubmission> {
        let mut windows = self.windows.lock().expect("coalescer poisoned");
        let window = windows.remove(player_name)?;
        widest_team(window.submissions)
    }

    /// Clears a window without materializing anything.
    pub fn cancel(&self, player_name: &str) -> bool {
        let mut windows = self.windows.lock().expect("coalescer poisoned");
        windows.remove(player_name).is_some()
    }
}

/// `Solo` counts as one; anything unparseable also counts as one.
pub fn team_size_rank(team_size: &str) -> i64 {
    if team_size.trim() == "Solo" {
        return 1;
    }
    team_size.trim().parse().unwrap_or(1)
}

fn widest_team(submissions: Vec<PbSubmission>) -> Option<PbSubmission> {
    submissions
        .into_iter()
        .max_by_key(|s| team_size_rank(&s.team_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(player: &str, team_size: &str) -> PbSubmission {
        PbSubmission {
            player_name: player.to_string(),
            account_hash: "hash-12345".to_string(),
            npc_name: "Theatre of Blood".to_string(),
            current_time_ms: Some(900_000),
            personal_best_ms: Some(930_000),
            team_size: team_size.to_string(),
            is_new_pb: true,
            unique_id: None,
            used_api: true,
            image_url: None,
        }
    }

    #[test]
    fn first_submission_opens_then_rest_buffer() {
        let coalescer = PbCoalescer::default();
        assert_eq!(
            coalescer.offer(submission("Bob", "3")),
            CoalesceAction::Opened
        );
        assert_eq!(
            coalescer.offer(submission("Bob", "Solo")),
            CoalesceAction::Buffered
        );
        // A different player gets their own window.
        assert_eq!(
            coalescer.offer(submission("Eve", "2")),
            CoalesceAction::Opened
        );
    }

    #[test]
    fn take_selects_the_widest_team_exactly_once() {
        let coalescer = PbCoalescer::default();
        coalescer.offer(submission("Bob", "3"));
        coalescer.offer(submission("Bob", "Solo"));
        coalescer.offer(submission("Bob", "5"));

        let winner = coalescer.take("Bob").expect("window should exist");
        assert_eq!(winner.team_size, "5");
        // The window is consumed; nothing further materializes.
        assert!(coalescer.take("Bob").is_none());
    }

    #[test]
    fn cancelled_windows_materialize_nothing() {
        let coalescer = PbCoalescer::default();
        coalescer.offer(submission("Bob", "4"));
        assert!(coalescer.cancel("Bob"));
        assert!(coalescer.take("Bob").is_none());
    }

    #[test]
    fn unparseable_team_sizes_rank_as_one() {
        assert_eq!(team_size_rank("Solo"), 1);
        assert_eq!(team_size_rank("5"), 5);
        assert_eq!(team_size_rank("duo?"), 1);
        assert_eq!(team_size_rank(" 3 "), 3);
    }

    #[test]
    fn raid_detection_matches_both_raids() {
        assert!(PbCoalescer::is_raid("Theatre of Blood: Entry Mode"));
        assert!(PbCoalescer::is_raid("Tombs of Amascut: Expert Mode"));
        assert!(!PbCoalescer::is_raid("King Black Dragon"));
    }
}
