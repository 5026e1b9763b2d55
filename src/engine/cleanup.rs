//! Session cleanup module
//!
//! Sessions that have not been used for `auth.session_idle_days` no longer
//! pass the auth gate. This background task deletes those rows so the
//! sessions table does not grow without bound.

use crate::config::AuthConfig;
use crate::db::Session;
use crate::DbPool;
use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

/// Handles pruning of idle sessions
pub struct SessionCleanup {
    db: DbPool,
    config: AuthConfig,
}

impl SessionCleanup {
    pub fn new(db: DbPool, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Run a single cleanup cycle
    pub async fn run_cleanup(&self) -> Result<CleanupStats> {
        let cutoff = self.config.session_idle_cutoff();
        let sessions_removed = Session::prune_idle(&self.db, &cutoff).await?;

        if sessions_removed > 0 {
            tracing::info!(
                sessions = sessions_removed,
                cutoff = %cutoff,
                "Pruned idle sessions"
            );
        } else {
            tracing::debug!(cutoff = %cutoff, "No idle sessions to prune");
        }

        Ok(CleanupStats { sessions_removed })
    }
}

/// Statistics from a cleanup run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub sessions_removed: u64,
}

/// Spawn the background cleanup task.
///
/// Returns `None` when the interval is zero (cleanup disabled). The caller
/// aborts the returned handle on shutdown.
pub fn spawn_cleanup_task(db: DbPool, config: AuthConfig) -> Option<JoinHandle<()>> {
    let interval_secs = config.session_cleanup_interval_secs;
    if interval_secs == 0 {
        tracing::info!("Session cleanup is disabled");
        return None;
    }

    tracing::info!(
        interval_secs = interval_secs,
        idle_days = config.session_idle_days,
        "Starting session cleanup task"
    );

    let cleanup = SessionCleanup::new(db, config);

    Some(tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            if let Err(e) = cleanup.run_cleanup().await {
                tracing::error!(error = %e, "Session cleanup cycle failed");
            }
        }
    }))
}
