pub mod audit;
pub mod cameras;
pub mod incidents;
pub mod sensors;
pub mod users;

pub use audit::AuditRepository;
pub use cameras::CamerasRepository;
pub use incidents::IncidentsRepository;
pub use sensors::SensorsRepository;
pub use users::UsersRepository;
