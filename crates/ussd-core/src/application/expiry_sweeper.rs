use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::application::session_engine::SessionEngine;
use crate::domain::repository::SessionRepository;
use crate::CoreError;

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Candidates returned by the repository
    pub scanned: usize,
    /// Sessions this pass moved to `Expired`
    pub expired: usize,
    pub failed: usize,
}

/// Periodically expires sessions that stopped receiving input.
///
/// Each candidate is expired through the engine, which takes the session's
/// exclusive section and re-checks it, so a sweep never overwrites an input
/// that renewed the session in the meantime.
pub struct ExpirySweeper {
    engine: Arc<SessionEngine>,
    session_repo: Arc<dyn SessionRepository>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        engine: Arc<SessionEngine>,
        session_repo: Arc<dyn SessionRepository>,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            session_repo,
            interval,
        }
    }

    /// Run one pass as of `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, CoreError> {
        let candidates = self.session_repo.find_expired(now).await?;
        let mut report = SweepReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for session_id in candidates {
            match self.engine.expire_if_lapsed(&session_id, now).await {
                Ok(true) => report.expired += 1,
                Ok(false) => debug!(session_id = %session_id, "Session renewed before sweep"),
                Err(err) => {
                    warn!(session_id = %session_id, error = %err, "Failed to expire session");
                    report.failed += 1;
                }
            }
        }

        if report.expired > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                expired = report.expired,
                failed = report.failed,
                "Expiry sweep finished"
            );
        }

        Ok(report)
    }

    /// Run one pass now
    pub async fn sweep(&self) -> Result<SweepReport, CoreError> {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep on a fixed interval until the returned handle is shut down
    pub fn start(self: Arc<Self>) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut interval = time::interval(self.interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = self.sweep().await {
                            warn!(error = %err, "Expiry sweep failed");
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }

            info!("Expiry sweeper stopped");
        });

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Stops a running sweeper
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop and wait for the current pass to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.task).await {
            warn!(error = %err, "Expiry sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
