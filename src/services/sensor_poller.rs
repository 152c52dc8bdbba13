use crate::db::models::sensor_models::SensorSnapshot;
use crate::db::repositories::sensors::SensorsRepository;
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Periodically recomputes the latest reading per active sensor and
/// publishes the result over a watch channel (latest snapshot wins).
/// One loop, sequential awaits: a new poll starts only after the previous
/// one has been applied, and cancelling the token tears the loop down.
pub struct SensorPoller {
    sensors_repo: SensorsRepository,
    poll_interval: Duration,
    tx: watch::Sender<Vec<SensorSnapshot>>,
}

impl SensorPoller {
    /// Create a new sensor poller
    pub fn new(pool: Arc<PgPool>, poll_interval_secs: u64) -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            sensors_repo: SensorsRepository::new(pool),
            poll_interval: Duration::from_secs(poll_interval_secs),
            tx,
        }
    }

    /// Subscribe to published snapshots
    pub fn subscribe(&self) -> watch::Receiver<Vec<SensorSnapshot>> {
        self.tx.subscribe()
    }

    /// Start the polling loop. Runs until the cancellation token fires.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Sensor poller shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.poll_once().await {
                            // Transient store failures keep the previous
                            // snapshot; the view degrades to stale data
                            // instead of crashing.
                            warn!("Sensor snapshot refresh failed: {}", e);
                        }
                    }
                }
            }
        })
    }

    /// Fetch and publish one snapshot cycle
    pub async fn poll_once(&self) -> Result<()> {
        let snapshots = self.sensors_repo.latest_snapshots().await?;
        debug!("Published {} sensor snapshots", snapshots.len());
        self.tx.send_replace(snapshots);
        Ok(())
    }
}
