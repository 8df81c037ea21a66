//! # Reservation Expiry Sweeper
//!
//! Deletes reservations whose `expire_at` has passed. Deletion is the only
//! write it performs, so it runs beside live sales without extra locking:
//! an expired hold already stopped counting against stock, the sweep just
//! removes the row.
//!
//! ```text
//! ┌──────────────────────────────┐        ┌───────────────────────────┐
//! │ ReservationSweeper::run      │        │ SweeperHandle             │
//! │                              │        │                           │
//! │  every interval:             │◄───────│ shutdown()                │
//! │    DELETE ... expire_at <= now│  mpsc  │                           │
//! └──────────────────────────────┘        └───────────────────────────┘
//! ```

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use till_db::{Database, ReservationRepository};

use crate::error::EngineResult;

/// Periodic expired-reservation cleanup.
pub struct ReservationSweeper {
    db: Database,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Stops a running [`ReservationSweeper`].
#[derive(Clone)]
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    /// Asks the sweeper to stop after its current pass.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl ReservationSweeper {
    pub fn new(db: Database, interval: Duration) -> (Self, SweeperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sweeper = ReservationSweeper {
            db,
            interval,
            shutdown_rx,
        };
        (sweeper, SweeperHandle { shutdown_tx })
    }

    /// One sweep; returns how many reservations were deleted.
    pub async fn sweep_once(&self) -> EngineResult<u64> {
        let mut conn = self.db.acquire().await?;
        let swept = ReservationRepository::new(&mut conn)
            .sweep_expired(Utc::now())
            .await?;
        Ok(swept)
    }

    /// Runs until the handle asks it to stop or every handle is dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Reservation sweeper starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(swept) => debug!(swept, "Reservation sweep finished"),
                        Err(e) => error!(?e, "Reservation sweep failed"),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Reservation sweeper shutting down");
                    break;
                }
            }
        }

        info!("Reservation sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_db::DbConfig;

    #[tokio::test]
    async fn test_sweep_on_empty_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (sweeper, _handle) = ReservationSweeper::new(db, Duration::from_secs(60));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (sweeper, handle) = ReservationSweeper::new(db, Duration::from_millis(10));

        let task = tokio::spawn(sweeper.run());
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.shutdown().await;

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
