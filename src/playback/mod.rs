use crate::db::models::camera_models::Camera;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub mod controller;
pub mod loader;

pub use controller::SessionController;
pub use loader::{HlsManifestLoader, ManifestLoader, StreamManifest};

/// Why a stream failed to load. Playback errors are scoped to one camera
/// tile and are recoverable via retry; they never escalate past the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackErrorKind {
    Network,
    Decode,
    Unsupported,
    Aborted,
    Timeout,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?} playback error: {message}")]
pub struct PlaybackError {
    pub kind: PlaybackErrorKind,
    pub message: String,
}

impl PlaybackError {
    pub fn new(kind: PlaybackErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Per-tile playback state machine:
/// Idle -> Loading -> Playing, or Loading -> Error -> (retry -> Loading).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Error(PlaybackErrorKind),
}

/// In-memory playback session, one per mounted camera tile. Created on
/// attach, destroyed on detach; at most one live session per camera id.
#[derive(Debug, Clone, Serialize)]
pub struct CameraSession {
    pub camera_id: Uuid,
    pub stream_url: String,
    #[serde(flatten)]
    pub state: PlaybackState,
    pub last_error: Option<String>,
    pub retry_count: u32,
}

impl CameraSession {
    fn new(camera_id: Uuid, stream_url: String) -> Self {
        Self {
            camera_id,
            stream_url,
            state: PlaybackState::Idle,
            last_error: None,
            retry_count: 0,
        }
    }
}

/// One camera enlarged, the rest as thumbnails in their original order
#[derive(Debug, Clone, Serialize)]
pub struct SpotlightView {
    pub spotlight: Camera,
    pub rest: Vec<Camera>,
}

/// Partition a camera set into a spotlighted camera and the remainder,
/// preserving the remainder's relative order. An id that is not in the set
/// falls back to the first camera. Returns `None` for an empty set.
pub fn select_spotlight(camera_id: &Uuid, cameras: &[Camera]) -> Option<SpotlightView> {
    let spotlight = cameras
        .iter()
        .find(|c| c.id == *camera_id)
        .or_else(|| cameras.first())?
        .clone();

    let rest = cameras
        .iter()
        .filter(|c| c.id != spotlight.id)
        .cloned()
        .collect();

    Some(SpotlightView { spotlight, rest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn camera(name: &str) -> Camera {
        Camera {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location: None,
            stream_url: format!("https://streams.local/{}/index.m3u8", name),
            active: true,
            created_at: Utc::now(),
            created_by: None,
        }
    }

    #[test]
    fn spotlight_partitions_and_preserves_order() {
        let cameras = vec![camera("a"), camera("b"), camera("c"), camera("d")];
        let view = select_spotlight(&cameras[2].id, &cameras).unwrap();

        assert_eq!(view.spotlight.id, cameras[2].id);
        let rest_ids: Vec<Uuid> = view.rest.iter().map(|c| c.id).collect();
        assert_eq!(rest_ids, vec![cameras[0].id, cameras[1].id, cameras[3].id]);
    }

    #[test]
    fn unknown_id_defaults_to_first_camera() {
        let cameras = vec![camera("a"), camera("b")];
        let view = select_spotlight(&Uuid::new_v4(), &cameras).unwrap();

        assert_eq!(view.spotlight.id, cameras[0].id);
        assert_eq!(view.rest.len(), 1);
        assert_eq!(view.rest[0].id, cameras[1].id);
    }

    #[test]
    fn empty_set_has_no_spotlight() {
        assert!(select_spotlight(&Uuid::new_v4(), &[]).is_none());
    }

    #[test]
    fn rest_is_the_set_minus_the_spotlight() {
        let cameras = vec![camera("a"), camera("b"), camera("c")];
        for target in &cameras {
            let view = select_spotlight(&target.id, &cameras).unwrap();
            assert_eq!(view.rest.len(), cameras.len() - 1);
            assert!(view.rest.iter().all(|c| c.id != view.spotlight.id));
        }
    }
}
