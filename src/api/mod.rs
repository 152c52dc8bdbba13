pub mod rest;

pub use rest::{ApiError, ApiResult, AppState, RestApi};
