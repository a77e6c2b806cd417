use crate::Db;
use droptally_core::SubmissionContext;
use log::warn;
use rocket::serde::json::Json;
use rocket::{State, get};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const REDIS_BUDGET: Duration = Duration::from_secs(1);
const DB_BUDGET: Duration = Duration::from_secs(2);

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub redis: bool,
}

#[get("/health")]
pub async fn health(ctx: &State<Arc<SubmissionContext>>, db: Db) -> Json<HealthResponse> {
    let redis_ok = match tokio::time::timeout(REDIS_BUDGET, ctx.leaderboard.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!("Health probe: redis error: {err}");
            false
        }
        Err(_) => {
            warn!("Health probe: redis exceeded its budget");
            false
        }
    };

    let db_probe = db.run(|conn| {
        use diesel::prelude::*;
        diesel::sql_query("SELECT 1").execute(conn)
    });
    let database_ok = match tokio::time::timeout(DB_BUDGET, db_probe).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            warn!("Health probe: database error: {err}");
            false
        }
        Err(_) => {
            warn!("Health probe: database exceeded its budget");
            false
        }
    };

    Json(HealthResponse {
        status: if redis_ok && database_ok { "ok" } else { "degraded" },
        database: database_ok,
        redis: redis_ok,
    })
}

#[get("/ping")]
pub fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({"message": "pong"}))
}
