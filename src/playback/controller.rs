use crate::db::models::camera_models::Camera;
use crate::playback::loader::ManifestLoader;
use crate::playback::{CameraSession, PlaybackErrorKind, PlaybackState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};
use uuid::Uuid;

/// Owns the runtime playback sessions, at most one per camera id. Sessions
/// are mutually independent, but operations on one tile are serialized
/// through its own lock: a detach always finishes before the next attach on
/// the same tile starts, so two loads never overlap.
pub struct SessionController {
    loader: Arc<dyn ManifestLoader>,
    load_timeout: Duration,
    tiles: Mutex<HashMap<Uuid, Arc<Mutex<CameraSession>>>>,
}

impl SessionController {
    /// Create a new session controller
    pub fn new(loader: Arc<dyn ManifestLoader>, load_timeout: Duration) -> Self {
        Self {
            loader,
            load_timeout,
            tiles: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a camera tile: load the stream manifest and transition the
    /// session to Playing or Error. A changed stream URL resets the session
    /// first, so the stale load can never survive a URL swap.
    pub async fn attach(&self, camera: &Camera) -> CameraSession {
        let tile = self
            .tile_entry(camera.id, &camera.stream_url)
            .await;
        let mut session = tile.lock().await;

        if session.stream_url != camera.stream_url {
            *session = CameraSession::new(camera.id, camera.stream_url.clone());
        }

        self.run_attach(&mut session).await;
        session.clone()
    }

    /// Re-attempt a failed attach, incrementing the retry counter and
    /// clearing the previous error. Returns `None` when no session exists
    /// for the camera.
    pub async fn retry(&self, camera_id: &Uuid) -> Option<CameraSession> {
        let tile = {
            let tiles = self.tiles.lock().await;
            tiles.get(camera_id).cloned()
        }?;

        let mut session = tile.lock().await;
        session.retry_count += 1;
        session.last_error = None;
        self.run_attach(&mut session).await;
        Some(session.clone())
    }

    /// Tear down a session. Waits for any in-flight operation on the tile,
    /// then releases it; returns whether a session existed.
    pub async fn detach(&self, camera_id: &Uuid) -> bool {
        let tile = {
            let tiles = self.tiles.lock().await;
            tiles.get(camera_id).cloned()
        };

        let Some(tile) = tile else {
            return false;
        };

        // Acquiring the tile lock sequences the detach behind any attach or
        // retry still running on this tile.
        let _guard = tile.lock().await;
        self.tiles.lock().await.remove(camera_id);
        debug!("Detached playback session for camera {}", camera_id);
        true
    }

    /// Snapshot of the current session for a camera, if one exists
    pub async fn get(&self, camera_id: &Uuid) -> Option<CameraSession> {
        let tile = {
            let tiles = self.tiles.lock().await;
            tiles.get(camera_id).cloned()
        }?;
        let session = tile.lock().await;
        Some(session.clone())
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.tiles.lock().await.len()
    }

    async fn tile_entry(&self, camera_id: Uuid, stream_url: &str) -> Arc<Mutex<CameraSession>> {
        let mut tiles = self.tiles.lock().await;
        tiles
            .entry(camera_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(CameraSession::new(
                    camera_id,
                    stream_url.to_string(),
                )))
            })
            .clone()
    }

    /// Drive one load attempt. The load runs under the configured timeout,
    /// so a session can never sit in Loading indefinitely.
    async fn run_attach(&self, session: &mut CameraSession) {
        session.state = PlaybackState::Loading;
        session.last_error = None;

        match timeout(self.load_timeout, self.loader.load(&session.stream_url)).await {
            Ok(Ok(manifest)) => {
                debug!(
                    "Camera {} playing ({} variants)",
                    session.camera_id, manifest.variant_count
                );
                session.state = PlaybackState::Playing;
            }
            Ok(Err(e)) => {
                warn!("Camera {} playback error: {}", session.camera_id, e);
                session.state = PlaybackState::Error(e.kind);
                session.last_error = Some(e.message);
            }
            Err(_) => {
                warn!(
                    "Camera {} manifest load timed out after {:?}",
                    session.camera_id, self.load_timeout
                );
                session.state = PlaybackState::Error(PlaybackErrorKind::Timeout);
                session.last_error = Some(format!(
                    "Manifest load timed out after {} ms",
                    self.load_timeout.as_millis()
                ));
            }
        }
    }
}
