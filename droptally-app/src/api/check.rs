use crate::{CheckFailCache, Db};
use chrono::{Duration, Utc};
use droptally_db::db;
use log::warn;
use rocket::serde::json::Json;
use rocket::{State, post};
use serde::{Deserialize, Serialize};

/// How many times a uuid may come back not-found before the shield reports
/// it processed, stopping plugins from resubmitting a poison pill forever.
const POISON_PILL_LIMIT: u32 = 10;

const LOOKUP_WINDOW_HOURS: i64 = 12;

#[derive(Deserialize)]
pub struct CheckRequest {
    pub uuid: String,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub processed: bool,
    pub status: &'static str,
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

#[post("/check", format = "json", data = "<body>")]
pub async fn check(
    body: Json<CheckRequest>,
    db: Db,
    fail_cache: &State<CheckFailCache>,
) -> Json<CheckResponse> {
    let uuid = body.into_inner().uuid;

    {
        let cache = fail_cache.0.lock().expect("check cache poisoned");
        if cache.get(&uuid).copied().unwrap_or(0) >= POISON_PILL_LIMIT {
            return Json(CheckResponse {
                processed: true,
                status: "processed",
                uuid,
                r#type: None,
                id: None,
            });
        }
    }

    let since = Utc::now() - Duration::hours(LOOKUP_WINDOW_HOURS);
    let lookup_uuid = uuid.clone();
    let lookup = tokio::time::timeout(
        std::time::Duration::from_secs(3),
        db.run(move |conn| db::check_submission_by_uuid(conn, &lookup_uuid, since)),
    )
    .await;

    let entry = match lookup {
        Ok(Ok(entry)) => entry,
        Ok(Err(err)) => {
            warn!("/check lookup failed for {uuid}: {err}");
            None
        }
        Err(_) => {
            return Json(CheckResponse {
                processed: false,
                status: "timeout",
                uuid,
                r#type: None,
                id: None,
            });
        }
    };

    match entry {
        Some((kind, id)) => Json(CheckResponse {
            processed: true,
            status: "processed",
            uuid,
            r#type: Some(kind),
            id: Some(id),
        }),
        None => {
            let mut cache = fail_cache.0.lock().expect("check cache poisoned");
            *cache.entry(uuid.clone()).or_insert(0) += 1;
            Json(CheckResponse {
                processed: false,
                status: "not_found",
                uuid,
                r#type: None,
                id: None,
            })
        }
    }
}
