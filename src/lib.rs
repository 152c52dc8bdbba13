pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod playback;
pub mod security;
pub mod services;

pub use error::Error;
pub use playback::{select_spotlight, CameraSession, PlaybackState, SessionController};
pub use services::incident_manager::IncidentManager;
pub use services::sensor_poller::SensorPoller;
pub use services::user_roster::UserRoster;
