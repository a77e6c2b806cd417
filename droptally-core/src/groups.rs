use droptally_db::{GLOBAL_GROUP_ID, PgConnection, QueryResult, db};
use serde::Serialize;

pub const DEFAULT_MIN_VALUE_TO_NOTIFY: i64 = 2_500_000;

/// Tri-state coercion over stored config strings: `true|1` and `false|0`
/// become booleans, the empty string becomes null, anything else stays a
/// string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Null,
    Text(String),
}

pub fn coerce_config_value(raw: &str) -> ConfigValue {
    match raw {
        "true" | "1" => ConfigValue::Bool(true),
        "false" | "0" => ConfigValue::Bool(false),
        "" => ConfigValue::Null,
        other => ConfigValue::Text(other.to_string()),
    }
}

pub fn is_truthy(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("true") | Some("1"))
}

/// The two settings that gate drop notifications for a group.
#[derive(Debug, Clone, Copy)]
pub struct DropNotifySettings {
    pub min_value_to_notify: i64,
    pub send_stacks: bool,
}

pub fn drop_notify_settings(
    conn: &mut PgConnection,
    group_id: i32,
) -> QueryResult<DropNotifySettings> {
    let min_value = db::group_config_value(conn, group_id, "minimum_value_to_notify")?
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_MIN_VALUE_TO_NOTIFY);
    let send_stacks = is_truthy(
        db::group_config_value(conn, group_id, "send_stacks_of_items")?.as_deref(),
    );
    Ok(DropNotifySettings {
        min_value_to_notify: min_value,
        send_stacks,
    })
}

pub fn group_notify_enabled(
    conn: &mut PgConnection,
    group_id: i32,
    key: &str,
) -> QueryResult<bool> {
    Ok(is_truthy(db::group_config_value(conn, group_id, key)?.as_deref()))
}

pub const CA_TIER_ORDER: [&str; 6] = ["easy", "medium", "hard", "elite", "master", "grandmaster"];

pub fn ca_tier_index(tier: &str) -> Option<usize> {
    let tier = tier.trim().to_lowercase();
    CA_TIER_ORDER.iter().position(|t| *t == tier)
}

/// Tier-based point awards; unknown tiers fall back to the easy award.
pub fn ca_tier_points(tier: &str) -> i64 {
    match ca_tier_index(tier) {
        Some(index) => index as i64 + 1,
        None => 1,
    }
}

/// Whether a task tier clears a group's `min_ca_tier_to_notify`. A missing
/// or `disabled` setting means no tier gating; the global group never gates
/// by tier.
pub fn ca_tier_allows(min_tier: Option<&str>, task_tier: &str, group_id: i32) -> bool {
    if group_id == GLOBAL_GROUP_ID {
        return true;
    }
    let Some(min_tier) = min_tier else {
        return true;
    };
    if min_tier.trim().eq_ignore_ascii_case("disabled") {
        return true;
    }
    let Some(min_index) = ca_tier_index(min_tier) else {
        return true;
    };
    match ca_tier_index(task_tier) {
        Some(task_index) => task_index >= min_index,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_is_tri_state() {
        assert_eq!(coerce_config_value("true"), ConfigValue::Bool(true));
        assert_eq!(coerce_config_value("1"), ConfigValue::Bool(true));
        assert_eq!(coerce_config_value("false"), ConfigValue::Bool(false));
        assert_eq!(coerce_config_value("0"), ConfigValue::Bool(false));
        assert_eq!(coerce_config_value(""), ConfigValue::Null);
        assert_eq!(
            coerce_config_value("2500000"),
            ConfigValue::Text("2500000".to_string())
        );
    }

    #[test]
    fn tier_gate_respects_the_ordered_list() {
        // min elite: easy/medium/hard blocked, elite and up allowed.
        for blocked in ["easy", "medium", "hard"] {
            assert!(!ca_tier_allows(Some("elite"), blocked, 10));
        }
        for allowed in ["elite", "master", "grandmaster"] {
            assert!(ca_tier_allows(Some("elite"), allowed, 10));
        }
    }

    #[test]
    fn tier_gate_disabled_and_global_group_pass_everything() {
        assert!(ca_tier_allows(Some("disabled"), "easy", 10));
        assert!(ca_tier_allows(None, "easy", 10));
        assert!(ca_tier_allows(Some("grandmaster"), "easy", GLOBAL_GROUP_ID));
    }

    #[test]
    fn unknown_task_tier_is_blocked_by_a_real_minimum() {
        assert!(!ca_tier_allows(Some("hard"), "mystery", 10));
        assert!(ca_tier_allows(Some("disabled"), "mystery", 10));
    }

    #[test]
    fn tier_points_follow_the_ladder() {
        assert_eq!(ca_tier_points("easy"), 1);
        assert_eq!(ca_tier_points("Medium"), 2);
        assert_eq!(ca_tier_points("hard"), 3);
        assert_eq!(ca_tier_points("elite"), 4);
        assert_eq!(ca_tier_points("master"), 5);
        assert_eq!(ca_tier_points("grandmaster"), 6);
        assert_eq!(ca_tier_points("unheard-of"), 1);
    }
}
