//! Background sync-cache refresher
//!
//! A cooperatively-scheduled task, started at the entry of `run`
//! (in-container exec), that ticks on a fixed cadence, re-aggregates
//! conflicts from the sync daemon, and rewrites the on-disk cache each tick
//! (§4.5, §5, §9's "background refresher task" note). Cancellation is a
//! `tokio::sync::watch` stop signal whose sender's `stop()` blocks until the
//! in-flight tick (if any) completes and returns the latest observed
//! conflicts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{warn, Instrument};

use crate::fs_env::FileSystem;
use crate::observability::{fields, sync_refresh_span};

use super::cache::SyncConflictCache;
use super::{aggregate_conflicts, ConflictInfo, SyncSessionClient};

/// Default refresh cadence (§4.5: "every few seconds").
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(5);

/// Handle to a running refresher task. Dropping this without calling
/// [`RefresherHandle::stop`] leaves the task running detached until the
/// process exits; commands should always call `stop` before returning.
pub struct RefresherHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<Vec<ConflictInfo>>,
}

impl RefresherHandle {
    /// Signal cancellation and wait for the in-flight tick (if any) to
    /// finish, returning the latest conflicts it observed. If no tick ever
    /// completed, returns an empty list.
    pub async fn stop(self) -> Vec<ConflictInfo> {
        let _ = self.stop_tx.send(true);
        self.join.await.unwrap_or_default()
    }
}

/// Start the refresher for `project_id`/`project_dir`, ticking every
/// `period` against `client` and writing through `fs` (never through
/// TransactFs — see [`super::cache`]).
pub fn start<C, F>(
    client: Arc<C>,
    fs: Arc<F>,
    project_dir: PathBuf,
    project_id: String,
    period: Duration,
) -> RefresherHandle
where
    C: SyncSessionClient + 'static,
    F: FileSystem + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        let mut latest = Vec::new();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    // `TimedSpan` holds an `EnteredSpan`, which is `!Send`; this
                    // tick runs inside a `tokio::spawn`ed future that must stay
                    // `Send`, so duration is timed by hand and attributed via
                    // `Instrument` instead of entering the span across the await.
                    let span = sync_refresh_span();
                    let start = std::time::Instant::now();
                    let outcome = aggregate_conflicts(client.as_ref(), &project_id)
                        .instrument(span.clone())
                        .await;
                    span.record(fields::DURATION_MS, start.elapsed().as_millis() as u64);
                    match outcome {
                        Ok(conflicts) => {
                            if let Err(e) = SyncConflictCache::save(fs.as_ref(), &project_dir, conflicts.clone()) {
                                warn!(error = %e, "failed to write sync conflict cache");
                            }
                            latest = conflicts;
                        }
                        Err(e) => {
                            warn!(error = %e, "sync refresh tick failed");
                        }
                    }
                    if *stop_rx.borrow() {
                        break;
                    }
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        latest
    });

    RefresherHandle { stop_tx, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_env::InMemoryFileSystem;
    use crate::sync::{ChangeEntry, EntryKind, MockSyncSessionClient, RawConflict, SessionDocument};
    use std::path::Path;

    #[tokio::test]
    async fn test_stop_before_first_tick_returns_empty() {
        let client = Arc::new(MockSyncSessionClient::new());
        let fs = Arc::new(InMemoryFileSystem::new());
        let handle = start(
            client,
            fs,
            PathBuf::from("/proj"),
            "p1".to_string(),
            Duration::from_secs(600),
        );
        let latest = handle.stop().await;
        assert!(latest.is_empty());
    }

    #[tokio::test]
    async fn test_tick_writes_cache_and_stop_returns_latest() {
        let client = Arc::new(MockSyncSessionClient::new().with_session(
            "alca-p1-0",
            SessionDocument {
                conflicts: vec![RawConflict {
                    root: "/".to_string(),
                    alpha_changes: vec![ChangeEntry {
                        path: "src/config.yaml".to_string(),
                        old: Some(EntryKind::Nothing),
                        new: Some(EntryKind::Present { digest: Some("d".to_string()) }),
                    }],
                    beta_changes: vec![],
                }],
            },
        ));
        let fs = Arc::new(InMemoryFileSystem::new());
        let handle = start(
            client,
            fs.clone(),
            PathBuf::from("/proj"),
            "p1".to_string(),
            Duration::from_millis(20),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        let latest = handle.stop().await;
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].path, "src/config.yaml");

        let cached = SyncConflictCache::load(fs.as_ref(), Path::new("/proj")).unwrap().unwrap();
        assert_eq!(cached.conflicts.len(), 1);
    }
}
