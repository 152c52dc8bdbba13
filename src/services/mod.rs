pub mod incident_manager;
pub mod sensor_poller;
pub mod user_roster;
#[cfg(test)]
mod tests;

pub use incident_manager::IncidentManager;
pub use sensor_poller::SensorPoller;
pub use user_roster::UserRoster;
