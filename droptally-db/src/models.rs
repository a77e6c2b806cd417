use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Insertable)]
#[diesel(table_name = crate::schema::players)]
pub struct NewPlayer<'a> {
    pub wom_id: Option<i32>,
    pub player_name: &'a str,
    pub account_hash: Option<&'a str>,
    pub log_slots: i32,
    pub total_level: i32,
    pub date_added: NaiveDateTime,
    pub date_updated: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::players)]
#[diesel(primary_key(player_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPlayer {
    pub player_id: i32,
    pub wom_id: Option<i32>,
    pub player_name: String,
    pub account_hash: Option<String>,
    pub user_id: Option<i32>,
    pub log_slots: i32,
    pub total_level: i32,
    pub hidden: bool,
    pub date_added: NaiveDateTime,
    pub date_updated: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbUser {
    pub user_id: i32,
    pub username: String,
    pub auth_token: String,
    pub discord_id: Option<String>,
    pub date_added: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::groups)]
#[diesel(primary_key(group_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbGroup {
    pub group_id: i32,
    pub group_name: String,
    pub wom_group_id: Option<i32>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub invite_url: Option<String>,
    pub date_added: NaiveDateTime,
    pub date_updated: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::group_configurations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbGroupConfiguration {
    pub id: i64,
    pub group_id: i32,
    pub config_key: String,
    pub config_value: String,
    pub long_value: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::items)]
pub struct NewItem<'a> {
    pub item_id: i32,
    pub item_name: &'a str,
    pub stackable: bool,
    pub noted: bool,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::items)]
#[diesel(primary_key(item_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbItem {
    pub item_id: i32,
    pub item_name: String,
    pub stackable: bool,
    pub noted: bool,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::npcs)]
pub struct NewNpc<'a> {
    pub npc_id: i32,
    pub npc_name: &'a str,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::npcs)]
#[diesel(primary_key(npc_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbNpc {
    pub npc_id: i32,
    pub npc_name: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::drops)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewDrop<'a> {
    pub player_id: i32,
    pub item_id: i32,
    pub npc_id: i32,
    pub value: i64,
    pub quantity: i32,
    pub partition: i32,
    pub image_url: Option<&'a str>,
    pub authenticated: bool,
    pub used_api: bool,
    pub unique_id: Option<&'a str>,
    pub date_added: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::drops)]
#[diesel(primary_key(drop_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbDrop {
    pub drop_id: i64,
    pub player_id: i32,
    pub item_id: i32,
    pub npc_id: i32,
    pub value: i64,
    pub quantity: i32,
    pub partition: i32,
    pub image_url: Option<String>,
    pub authenticated: bool,
    pub used_api: bool,
    pub unique_id: Option<String>,
    pub date_added: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::personal_bests)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPersonalBest<'a> {
    pub player_id: i32,
    pub npc_id: i32,
    pub team_size: &'a str,
    pub personal_best_ms: i64,
    pub kill_time_ms: i64,
    pub new_pb: bool,
    pub image_url: Option<&'a str>,
    pub used_api: bool,
    pub unique_id: Option<&'a str>,
    pub date_added: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::personal_bests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPersonalBest {
    pub id: i64,
    pub player_id: i32,
    pub npc_id: i32,
    pub team_size: String,
    pub personal_best_ms: i64,
    pub kill_time_ms: i64,
    pub new_pb: bool,
    pub image_url: Option<String>,
    pub used_api: bool,
    pub unique_id: Option<String>,
    pub date_added: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::combat_achievements)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewCombatAchievement<'a> {
    pub player_id: i32,
    pub task_name: &'a str,
    pub image_url: Option<&'a str>,
    pub used_api: bool,
    pub unique_id: Option<&'a str>,
    pub date_added: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::combat_achievements)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbCombatAchievement {
    pub id: i64,
    pub player_id: i32,
    pub task_name: String,
    pub image_url: Option<String>,
    pub used_api: bool,
    pub unique_id: Option<String>,
    pub date_added: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::collection_log_entries)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewCollectionLogEntry<'a> {
    pub player_id: i32,
    pub item_id: i32,
    pub npc_id: i32,
    pub reported_slots: Option<i32>,
    pub image_url: Option<&'a str>,
    pub used_api: bool,
    pub unique_id: Option<&'a str>,
    pub date_added: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::collection_log_entries)]
#[diesel(primary_key(log_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbCollectionLogEntry {
    pub log_id: i64,
    pub player_id: i32,
    pub item_id: i32,
    pub npc_id: i32,
    pub reported_slots: Option<i32>,
    pub image_url: Option<String>,
    pub used_api: bool,
    pub unique_id: Option<String>,
    pub date_added: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::player_pets)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPlayerPet<'a> {
    pub player_id: i32,
    pub item_id: i32,
    pub pet_name: &'a str,
    pub unique_id: Option<&'a str>,
    pub date_added: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::player_pets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPlayerPet {
    pub id: i64,
    pub player_id: i32,
    pub item_id: i32,
    pub pet_name: String,
    pub unique_id: Option<String>,
    pub date_added: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::notification_queue)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewNotification<'a> {
    pub notification_type: &'a str,
    pub player_id: i32,
    pub group_id: Option<i32>,
    pub data: &'a str,
    pub status: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::notification_queue)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbNotification {
    pub id: i64,
    pub notification_type: String,
    pub player_id: i32,
    pub group_id: Option<i32>,
    pub data: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
    pub error: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::point_credits)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPointCredit<'a> {
    pub player_id: Option<i32>,
    pub group_id: Option<i32>,
    pub source: &'a str,
    pub amount: i64,
    pub amount_remaining: i64,
    pub earned_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
    pub status: &'a str,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::point_credits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPointCredit {
    pub id: i64,
    pub player_id: Option<i32>,
    pub group_id: Option<i32>,
    pub source: String,
    pub amount: i64,
    pub amount_remaining: i64,
    pub earned_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
    pub status: String,
    pub revoked_at: Option<NaiveDateTime>,
    pub revocation_reason: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::point_debits)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPointDebit<'a> {
    pub player_id: Option<i32>,
    pub group_id: Option<i32>,
    pub spent_by_player_id: Option<i32>,
    pub amount: i64,
    pub reason: &'a str,
    pub allocations: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::point_debits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPointDebit {
    pub id: i64,
    pub player_id: Option<i32>,
    pub group_id: Option<i32>,
    pub spent_by_player_id: Option<i32>,
    pub amount: i64,
    pub reason: String,
    pub allocations: serde_json::Value,
    pub activation_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::premium_features)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPremiumFeature {
    pub id: i32,
    pub feature_key: String,
    pub name: String,
    pub scope: String,
    pub cost_points: i64,
    pub duration_days: i32,
    pub allow_multiple: bool,
    pub active: bool,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::feature_activations)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewFeatureActivation<'a> {
    pub player_id: Option<i32>,
    pub group_id: Option<i32>,
    pub feature_id: i32,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub auto_renew: bool,
    pub status: &'a str,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::feature_activations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbFeatureActivation {
    pub id: i64,
    pub player_id: Option<i32>,
    pub group_id: Option<i32>,
    pub feature_id: i32,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub auto_renew: bool,
    pub status: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::recurring_point_grants)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewRecurringPointGrant<'a> {
    pub player_id: i32,
    pub source: &'a str,
    pub external_ref: Option<&'a str>,
    pub amount_per_period: i64,
    pub cadence: &'a str,
    pub last_granted_at: Option<NaiveDateTime>,
    pub next_due_at: Option<NaiveDateTime>,
    pub status: &'a str,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::recurring_point_grants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbRecurringPointGrant {
    pub id: i64,
    pub player_id: i32,
    pub source: String,
    pub external_ref: Option<String>,
    pub amount_per_period: i64,
    pub cadence: String,
    pub last_granted_at: Option<NaiveDateTime>,
    pub next_due_at: Option<NaiveDateTime>,
    pub status: String,
}
