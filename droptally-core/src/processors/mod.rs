pub mod adventure_log;
pub mod ca;
pub mod clog;
pub mod drop;
pub mod pb;
pub mod pet;

use crate::context::SubmissionContext;
use crate::error::{SubmissionError, SubmissionOutcome};
use droptally_db::db;
use droptally_db::models::DbGroup;
use hashbrown::HashMap;
use log::debug;
use std::sync::Arc;

/// An embed's `fields[].name -> fields[].value` pairs, flattened. Field
/// names vary across plugin versions, so lookups take alternatives.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFields(HashMap<String, String>);

impl SubmissionFields {
    pub fn from_embed(embed: &serde_json::Value) -> Self {
        let mut map = HashMap::new();
        if let Some(fields) = embed.get("fields").and_then(|f| f.as_array()) {
            for field in fields {
                let name = field.get("name").and_then(|n| n.as_str());
                let value = field.get("value");
                if let (Some(name), Some(value)) = (name, value) {
                    let value = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    map.insert(name.to_string(), value);
                }
            }
        }
        Self(map)
    }

    pub fn insert(&mut self, name: &str, value: String) {
        self.0.insert(name.to_string(), value);
    }

    /// First non-empty value among the alternative field names.
    pub fn get(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.0.get(*name))
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }

    pub fn required(&self, names: &[&str], what: &str) -> Result<String, SubmissionError> {
        self.get(names)
            .map(str::to_string)
            .ok_or_else(|| SubmissionError::validation(format!("missing {what}")))
    }

    pub fn get_i64(&self, names: &[&str]) -> Option<i64> {
        self.get(names).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_i32(&self, names: &[&str]) -> Option<i32> {
        self.get(names).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_bool(&self, names: &[&str]) -> bool {
        matches!(
            self.get(names).map(|v| v.trim().to_lowercase()).as_deref(),
            Some("true") | Some("1")
        )
    }
}

/// Routes one flattened embed to its processor by the `type` field.
/// Reserved types resolve to None without side effects.
pub async fn dispatch_embed(
    ctx: &Arc<SubmissionContext>,
    fields: SubmissionFields,
) -> Result<Option<SubmissionOutcome>, SubmissionError> {
    let kind = fields
        .get(&["type"])
        .map(str::to_string)
        .ok_or_else(|| SubmissionError::validation("embed has no type field"))?;

    match kind.as_str() {
        "drop" | "other" | "npc" => drop::process(ctx, &fields).await.map(Some),
        "personal_best" | "kill_time" | "npc_kill" => pb::process(ctx, &fields).await,
        "combat_achievement" => ca::process(ctx, &fields).await.map(Some),
        "collection_log" => clog::process(ctx, &fields).await.map(Some),
        "pet" => pet::process(ctx, &fields).await.map(Some),
        "adventure_log" => adventure_log::process(ctx, &fields).await.map(Some),
        "experience_update" | "experience_milestone" | "level_up" | "quest_completion" => {
            debug!("Ignoring reserved submission type {kind}");
            Ok(None)
        }
        other => {
            debug!("Ignoring unknown submission type {other}");
            Ok(None)
        }
    }
}

/// The groups a player's submission fans out to, with global membership
/// guaranteed.
pub(crate) async fn player_groups(
    ctx: &SubmissionContext,
    player_id: i32,
) -> Result<Vec<DbGroup>, SubmissionError> {
    ctx.run_db(move |conn| Ok(db::groups_for_player(conn, player_id)?))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_embed_fields_and_resolves_alternatives() {
        let embed = json!({
            "title": "Drop",
            "fields": [
                {"name": "type", "value": "drop"},
                {"name": "player", "value": "Alice"},
                {"name": "value", "value": "60000"},
                {"name": "quantity", "value": 2},
                {"name": "is_pb", "value": "true"},
            ]
        });
        let fields = SubmissionFields::from_embed(&embed);

        assert_eq!(fields.get(&["type"]), Some("drop"));
        assert_eq!(fields.get(&["player_name", "player"]), Some("Alice"));
        assert_eq!(fields.get_i64(&["value"]), Some(60_000));
        assert_eq!(fields.get_i64(&["quantity"]), Some(2));
        assert!(fields.get_bool(&["is_new_pb", "is_pb"]));
        assert_eq!(fields.get(&["missing"]), None);
        assert!(fields.required(&["acc_hash"], "account hash").is_err());
    }
}
