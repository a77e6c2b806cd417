use crate::board::BoardRefreshHandle;
use crate::coalescer::PbCoalescer;
use crate::config::CoreConfig;
use crate::dedup::DedupCache;
use crate::error::SubmissionError;
use crate::leaderboard::LeaderboardStore;
use crate::notify::NotificationDeduper;
use crate::resolver::NameIdCache;
use droptally_db::{ConnectionPool, PgConnection};
use osrs_api::{OsrsApiClient, WomClient};
use std::sync::Arc;

use crate::attachments::AttachmentSink;

/// Everything a submission processor needs, owned in one place and injected
/// rather than reached for globally. One context is shared by all in-flight
/// submissions.
pub struct SubmissionContext {
    pub config: CoreConfig,
    pub db: ConnectionPool,
    pub redis: deadpool_redis::Pool,
    pub osrs: OsrsApiClient,
    pub wom: WomClient,
    pub dedup: DedupCache,
    pub npc_ids: NameIdCache,
    pub notifications: NotificationDeduper,
    pub coalescer: PbCoalescer,
    pub leaderboard: LeaderboardStore,
    pub attachments: AttachmentSink,
    pub boards: BoardRefreshHandle,
}

impl SubmissionContext {
    pub fn new(
        config: CoreConfig,
        db: ConnectionPool,
        redis: deadpool_redis::Pool,
        boards: BoardRefreshHandle,
    ) -> Arc<Self> {
        let attachments = AttachmentSink::new(
            config.attachment_root.clone(),
            config.attachment_base_url.clone(),
        );
        Arc::new(Self {
            leaderboard: LeaderboardStore::new(redis.clone()),
            config,
            db,
            redis,
            osrs: OsrsApiClient::new(),
            wom: WomClient::new(),
            dedup: DedupCache::default(),
            npc_ids: NameIdCache::default(),
            notifications: NotificationDeduper::default(),
            coalescer: PbCoalescer::default(),
            attachments,
            boards,
        })
    }

    /// Runs blocking Diesel work on the blocking pool with a pooled
    /// connection, the same shape as `rocket_sync_db_pools`' `run`.
    pub async fn run_db<T, F>(&self, f: F) -> Result<T, SubmissionError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, SubmissionError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| SubmissionError::internal(format!("db pool exhausted: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| SubmissionError::internal(format!("db task panicked: {e}")))?
    }
}
