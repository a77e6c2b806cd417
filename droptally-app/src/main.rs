mod api;

use droptally_core::board::spawn_board_refresher;
use droptally_core::{CoreConfig, SubmissionContext, scheduler};
use rocket::fairing::AdHoc;
use rocket::figment::map;
use rocket::{Build, Rocket, figment, launch};
use rocket_sync_db_pools::database as sync_database;
use rocket_sync_db_pools::diesel::PgConnection;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[sync_database("droptally")]
pub struct Db(PgConnection);

/// Counts failed `/check` lookups per uuid for the poison-pill shield.
pub struct CheckFailCache(pub Mutex<HashMap<String, u32>>);

struct PipelineShutdown(CancellationToken);

fn get_figment_with_constructed_db_url(config: &CoreConfig) -> figment::Figment {
    let url = droptally_db::postgres_url_from_environment();
    rocket::Config::figment()
        .merge(("databases", map!["droptally" => map!["url" => url]]))
        .merge(("port", config.api_port))
        .merge(("limits.file", "8MiB"))
        .merge(("limits.form", "10MiB"))
}

async fn run_migrations(rocket: Rocket<Build>) -> Rocket<Build> {
    use diesel::Connection;
    use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../migrations");
    let config: rocket_sync_db_pools::Config = rocket
        .figment()
        .extract_inner("databases.droptally")
        .expect("droptally database connection information was not found");

    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&config.url)
            .expect("Failed to connect to the database during migrations");

        conn.run_pending_migrations(MIGRATIONS)
            .expect("Failed to apply migrations");
    })
    .await
    .expect("Error joining migrations task");

    rocket
}

async fn start_pipeline(rocket: Rocket<Build>) -> Rocket<Build> {
    let config = CoreConfig::config().expect("Core configuration is invalid");

    let db_pool =
        droptally_db::get_pool(config.db_pool_size).expect("Failed to build the database pool");

    // Long queries are bounded; anything slower than this is a bug.
    let timeout_pool = db_pool.clone();
    let timeout_result = tokio::task::spawn_blocking(
        move || -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
            let mut conn = timeout_pool.get()?;
            Ok(droptally_db::db::set_current_user_statement_timeout(
                &mut conn, 30,
            )?)
        },
    )
    .await
    .expect("Error joining statement timeout task");
    if let Err(err) = timeout_result {
        log::warn!("Could not set the statement timeout: {err}");
    }
    let redis = deadpool_redis::Config::from_url(&config.redis_url)
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("Failed to build the redis pool");

    let cancel = CancellationToken::new();
    let boards = spawn_board_refresher(db_pool.clone(), cancel.clone());
    let ctx = SubmissionContext::new(config, db_pool, redis, boards);
    scheduler::spawn_periodic_tasks(ctx.clone(), cancel.clone());

    rocket.manage(ctx).manage(PipelineShutdown(cancel))
}

#[launch]
fn rocket() -> _ {
    let config = CoreConfig::config().expect("Core configuration is invalid");

    rocket::custom(get_figment_with_constructed_db_url(&config))
        .mount("/", api::routes())
        .manage(CheckFailCache(Mutex::new(HashMap::new())))
        .attach(Db::fairing())
        .attach(AdHoc::on_ignite("Migrations", run_migrations))
        .attach(AdHoc::on_ignite("Submission pipeline", start_pipeline))
        .attach(AdHoc::on_shutdown("Stop periodic tasks", |rocket| {
            Box::pin(async move {
                if let Some(shutdown) = rocket.state::<PipelineShutdown>() {
                    shutdown.0.cancel();
                }
            })
        }))
}
