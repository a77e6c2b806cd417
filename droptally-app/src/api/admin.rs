use crate::api::ApiError;
use droptally_core::SubmissionContext;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{State, post};
use serde_json::json;
use std::sync::Arc;

/// Guard for operator-only paths. Admin routes exist only when
/// `JWT_TOKEN_KEY` is configured; the bearer token must match it.
pub struct AdminToken;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(ctx) = request.rocket().state::<Arc<SubmissionContext>>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };
        let Some(expected) = ctx.config.jwt_token_key.as_deref() else {
            return Outcome::Error((Status::NotFound, ()));
        };

        let supplied = request
            .headers()
            .get_one("Authorization")
            .and_then(|header| header.strip_prefix("Bearer "));
        match supplied {
            Some(token) if token == expected => Outcome::Success(AdminToken),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Rebuilds one player's Redis aggregates from the drop history. Long
/// running; concurrent requests for the same player serialize on the
/// per-player rebuild lock.
#[post("/admin/force_rebuild/<player_id>")]
pub async fn force_rebuild(
    _token: AdminToken,
    player_id: i32,
    ctx: &State<Arc<SubmissionContext>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.leaderboard
        .force_rebuild(ctx.db.clone(), player_id)
        .await?;
    Ok(Json(json!({
        "message": "rebuild complete",
        "player_id": player_id,
    })))
}

/// On-demand group membership reconciliation.
#[post("/admin/sync_groups")]
pub async fn sync_groups(
    _token: AdminToken,
    ctx: &State<Arc<SubmissionContext>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    droptally_core::sync::sync_all_groups(ctx, false).await?;
    Ok(Json(json!({"message": "group sync complete"})))
}
