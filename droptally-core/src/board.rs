use chrono::Utc;
use droptally_db::ConnectionPool;
use droptally_db::db;
use droptally_db::models::NewNotification;
use hashbrown::HashMap;
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Minimum spacing between accepted refreshes for one group.
pub const REFRESH_THROTTLE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct BoardRefresh {
    pub group_id: i32,
    pub player_id: i32,
    pub force: bool,
}

/// Handle for requesting group board refreshes. The owning actor applies
/// the per-group throttle; a full channel just drops the request, which is
/// fine for a refresh hint.
#[derive(Clone)]
pub struct BoardRefreshHandle {
    tx: mpsc::Sender<BoardRefresh>,
}

impl BoardRefreshHandle {
    pub fn request(&self, refresh: BoardRefresh) {
        if let Err(err) = self.tx.try_send(refresh) {
            debug!("Board refresh request dropped: {err}");
        }
    }
}

/// Pure throttle state so the 10-second rule is testable apart from the
/// actor plumbing.
pub struct RefreshThrottle {
    last_refresh: HashMap<i32, Instant>,
}

impl RefreshThrottle {
    pub fn new() -> Self {
        Self {
            last_refresh: HashMap::new(),
        }
    }

    /// Returns true when a refresh for the group may run now, recording the
    /// acceptance.
    pub fn try_accept(&mut self, group_id: i32, now: Instant) -> bool {
        match self.last_refresh.get(&group_id) {
            Some(last) if now.duration_since(*last) < REFRESH_THROTTLE => false,
            _ => {
                self.last_refresh.insert(group_id, now);
                true
            }
        }
    }
}

impl Default for RefreshThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the refresh actor. Accepted refreshes become durable
/// `board_refresh` notifications for the downstream board renderer, which
/// is an external collaborator.
pub fn spawn_board_refresher(pool: ConnectionPool, cancel: CancellationToken) -> BoardRefreshHandle {
    let (tx, mut rx) = mpsc::channel::<BoardRefresh>(256);

    tokio::spawn(async move {
        let mut throttle = RefreshThrottle::new();
        loop {
            let refresh = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Board refresher shutting down");
                    return;
                }
                refresh = rx.recv() => match refresh {
                    Some(refresh) => refresh,
                    None => return,
                },
            };

            if !throttle.try_accept(refresh.group_id, Instant::now()) {
                debug!(
                    "Skipping board refresh for group {}: inside throttle window",
                    refresh.group_id
                );
                continue;
            }

            let pool = pool.clone();
            let result = tokio::task::spawn_blocking(move || {
                let mut conn = pool.get()?;
                let now = Utc::now();
                let data = serde_json::json!({
                    "group_id": refresh.group_id,
                    "force": refresh.force,
                    "requested_at": now.to_rfc3339(),
                })
                .to_string();
                db::insert_notification(
                    &mut conn,
                    &NewNotification {
                        notification_type: "board_refresh",
                        player_id: refresh.player_id,
                        group_id: Some(refresh.group_id),
                        data: &data,
                        status: "pending",
                        created_at: now.naive_utc(),
                    },
                )
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            })
            .await;

            match result {
                Ok(Ok(_)) => debug!("Enqueued board refresh for group {}", refresh.group_id),
                Ok(Err(err)) => error!("Board refresh enqueue failed: {err}"),
                Err(err) => error!("Board refresh task panicked: {err}"),
            }
        }
    });

    BoardRefreshHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_admits_once_per_window_per_group() {
        let mut throttle = RefreshThrottle::new();
        let t0 = Instant::now();

        assert!(throttle.try_accept(2, t0));
        assert!(!throttle.try_accept(2, t0 + Duration::from_secs(5)));
        // A different group is independent.
        assert!(throttle.try_accept(3, t0 + Duration::from_secs(5)));
        // Past the window the group is admitted again.
        assert!(throttle.try_accept(2, t0 + Duration::from_secs(10)));
    }
}
