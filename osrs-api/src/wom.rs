use crate::limit::RateLimiter;
use crate::{UpstreamError, get_json};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const WOM_API_BASE: &str = "https://api.wiseoldman.net/v2";
const WOM_BUDGET: Duration = Duration::from_secs(10);

/// The slice of a Wise Old Man player record the pipeline cares about.
#[derive(Debug, Clone)]
pub struct WomPlayer {
    pub wom_id: i32,
    pub display_name: String,
    pub total_level: i32,
    /// Collection log slots unlocked; -1 when the player has no snapshot.
    pub log_slots: i32,
}

#[derive(Debug, Clone)]
pub struct WomGroupMember {
    pub wom_id: i32,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDetails {
    id: i32,
    display_name: String,
    latest_snapshot: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    data: SnapshotData,
}

#[derive(Debug, Deserialize)]
struct SnapshotData {
    #[serde(default)]
    skills: HashMap<String, Skill>,
    #[serde(default)]
    activities: HashMap<String, Activity>,
    #[serde(default)]
    bosses: HashMap<String, Boss>,
}

#[derive(Debug, Deserialize)]
struct Skill {
    #[serde(default)]
    level: i32,
}

#[derive(Debug, Deserialize)]
struct Activity {
    #[serde(default = "minus_one")]
    score: i32,
}

#[derive(Debug, Deserialize)]
struct Boss {
    #[serde(default)]
    kills: i64,
}

fn minus_one() -> i32 {
    -1
}

#[derive(Debug, Deserialize)]
struct GroupDetails {
    #[serde(default)]
    memberships: Vec<Membership>,
}

#[derive(Debug, Deserialize)]
struct Membership {
    player: MembershipPlayer,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembershipPlayer {
    id: i32,
    display_name: String,
}

/// Client for the external player-metadata service (Wise Old Man). A player
/// that this service does not know is treated as nonexistent by the
/// entity resolver.
#[derive(Clone)]
pub struct WomClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl WomClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            limiter: Arc::new(RateLimiter::by_convention()),
        }
    }

    /// Looks up a player by username. `Ok(None)` means the service answered
    /// and does not know the player; errors are transient.
    pub async fn player_details(&self, username: &str) -> Result<Option<WomPlayer>, UpstreamError> {
        let request = self
            .client
            .get(format!("{WOM_API_BASE}/players/{}", encode(username)));
        let details: PlayerDetails =
            match get_json(&self.client, &self.limiter, WOM_BUDGET, request).await {
                Ok(details) => details,
                Err(UpstreamError::Status(err)) if is_not_found(&err) => return Ok(None),
                Err(err) => return Err(err),
            };

        Ok(Some(flatten_player(details)))
    }

    /// The player's kill count at a boss, or None when the service doesn't
    /// track that boss or player.
    pub async fn player_boss_kills(
        &self,
        username: &str,
        boss_name: &str,
    ) -> Result<Option<i64>, UpstreamError> {
        let request = self
            .client
            .get(format!("{WOM_API_BASE}/players/{}", encode(username)));
        let details: PlayerDetails =
            match get_json(&self.client, &self.limiter, WOM_BUDGET, request).await {
                Ok(details) => details,
                Err(UpstreamError::Status(err)) if is_not_found(&err) => return Ok(None),
                Err(err) => return Err(err),
            };

        let metric = boss_metric_name(boss_name);
        let kills = details
            .latest_snapshot
            .and_then(|snapshot| snapshot.data.bosses.get(&metric).map(|b| b.kills));
        if kills.is_none() {
            debug!("No boss metric {metric} for {username}");
        }
        Ok(kills)
    }

    /// The authoritative roster of a group, as (wom_id, display_name) pairs.
    /// An unknown group resolves to an empty roster.
    pub async fn group_members(
        &self,
        wom_group_id: i32,
    ) -> Result<Vec<WomGroupMember>, UpstreamError> {
        let request = self
            .client
            .get(format!("{WOM_API_BASE}/groups/{wom_group_id}"));
        let details: GroupDetails =
            match get_json(&self.client, &self.limiter, WOM_BUDGET, request).await {
                Ok(details) => details,
                Err(UpstreamError::Status(err)) if is_not_found(&err) => return Ok(Vec::new()),
                Err(err) => return Err(err),
            };

        Ok(details
            .memberships
            .into_iter()
            .map(|m| WomGroupMember {
                wom_id: m.player.id,
                display_name: m.player.display_name,
            })
            .collect())
    }
}

impl Default for WomClient {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten_player(details: PlayerDetails) -> WomPlayer {
    let (total_level, log_slots) = match &details.latest_snapshot {
        Some(snapshot) => {
            let total_level = snapshot
                .data
                .skills
                .get("overall")
                .map(|s| s.level)
                .unwrap_or(0);
            let log_slots = snapshot
                .data
                .activities
                .get("collections_logged")
                .map(|a| a.score.max(0))
                .unwrap_or(0);
            (total_level, log_slots)
        }
        None => (0, -1),
    };

    WomPlayer {
        wom_id: details.id,
        display_name: details.display_name,
        total_level,
        log_slots,
    }
}

fn is_not_found(err: &reqwest::Error) -> bool {
    err.status() == Some(reqwest::StatusCode::NOT_FOUND)
}

fn encode(username: &str) -> String {
    username.replace(' ', "%20")
}

/// The service keys boss metrics by snake_cased boss name.
fn boss_metric_name(boss_name: &str) -> String {
    boss_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boss_metric_names_are_snake_cased() {
        assert_eq!(boss_metric_name("King Black Dragon"), "king_black_dragon");
        assert_eq!(
            boss_metric_name("Theatre of Blood: Hard Mode"),
            "theatre_of_blood_hard_mode"
        );
        assert_eq!(boss_metric_name("Kree'arra"), "kree_arra");
    }

    #[test]
    fn flatten_uses_snapshot_when_present() {
        let details = PlayerDetails {
            id: 42,
            display_name: "Alice".to_string(),
            latest_snapshot: Some(Snapshot {
                data: SnapshotData {
                    skills: HashMap::from([("overall".to_string(), Skill { level: 2100 })]),
                    activities: HashMap::from([(
                        "collections_logged".to_string(),
                        Activity { score: 550 },
                    )]),
                    bosses: HashMap::new(),
                },
            }),
        };
        let player = flatten_player(details);
        assert_eq!(player.total_level, 2100);
        assert_eq!(player.log_slots, 550);
    }

    #[test]
    fn flatten_marks_missing_snapshot_with_sentinel_slots() {
        let details = PlayerDetails {
            id: 42,
            display_name: "Alice".to_string(),
            latest_snapshot: None,
        };
        let player = flatten_player(details);
        assert_eq!(player.log_slots, -1);
        assert_eq!(player.total_level, 0);
    }
}
