use crate::config::ApiConfig;
use crate::db::models::audit_models::{AuditAction, AuditEntry};
use crate::db::models::camera_models::{Camera, NewCamera};
use crate::db::models::incident_models::{Incident, IncidentWithAcknowledger};
use crate::db::models::sensor_models::SensorSnapshot;
use crate::db::models::user_models::{AuthToken, LoginCredentials, User, UserPatch, UserRole};
use crate::db::repositories::audit::AuditRepository;
use crate::db::repositories::cameras::CamerasRepository;
use crate::db::DatabaseService;
use crate::error::Error;
use crate::playback::{select_spotlight, CameraSession, SessionController, SpotlightView};
use crate::security::auth::AuthService;
use crate::security::{authorize, Action, SecurityService, SessionUser};
use crate::services::{IncidentManager, UserRoster};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Number of incidents returned by the /incidents/recent endpoint
const RECENT_INCIDENT_LIMIT: i64 = 5;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<DatabaseService>,
    pub security: Arc<SecurityService>,
    pub auth: Arc<AuthService>,
    pub incidents: IncidentManager,
    pub roster: UserRoster,
    pub cameras_repo: CamerasRepository,
    pub audit_repo: AuditRepository,
    pub playback: Arc<SessionController>,
    pub sensor_feed: watch::Receiver<Vec<SensorSnapshot>>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
}

impl ApiError {
    fn unauthenticated(message: &str) -> Self {
        ApiError {
            message: message.to_string(),
            status: StatusCode::UNAUTHORIZED.as_u16(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Authentication(_) => StatusCode::UNAUTHORIZED,
            Error::Authorization(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            e if e.is_conflict() => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            message: err.to_string(),
            status: status.as_u16(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<Error>() {
            return err.clone().into();
        }

        ApiError {
            message: err.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }
}

/// Implement IntoResponse for ApiError
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(self);
        (status, body).into_response()
    }
}

/// The authenticated session, extracted from the bearer token before any
/// handler body runs. Requests without a valid token are rejected with 401.
pub struct AuthSession(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthenticated("Missing Authorization header"))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthenticated("Expected a Bearer token"))?;

        let token_data = state
            .security
            .validate_token(token)
            .map_err(|_| ApiError::unauthenticated("Invalid or expired token"))?;

        let user = SessionUser::from_claims(&token_data.claims)
            .map_err(|_| ApiError::unauthenticated("Malformed session claims"))?;

        Ok(AuthSession(user))
    }
}

pub struct RestApi {
    config: ApiConfig,
    state: AppState,
}

impl RestApi {
    pub fn new(config: &ApiConfig, state: AppState) -> Self {
        Self {
            config: config.clone(),
            state,
        }
    }

    pub fn router(state: AppState) -> Router {
        // Create a CORS layer that allows all origins and preflight requests
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(false)
            .max_age(Duration::from_secs(3600));

        Router::new()
            // Auth routes
            .route("/api/auth/login", post(login))
            // Incident routes
            .route("/api/incidents", get(list_incidents))
            .route("/api/incidents/recent", get(recent_incidents))
            .route("/api/incidents/:id/acknowledge", post(acknowledge_incident))
            .route("/api/incidents/:id/resolve", post(resolve_incident))
            .route("/api/monitoring/simulate", post(simulate_incident))
            // User routes
            .route("/api/users", get(list_users))
            .route("/api/users", post(create_user))
            .route("/api/users/:id", put(update_user))
            .route("/api/users/:id", delete(delete_user))
            // Camera routes
            .route("/api/cameras", get(list_cameras))
            .route("/api/cameras", post(create_camera))
            .route("/api/cameras/spotlight", get(spotlight_view))
            .route("/api/cameras/:id", put(update_camera))
            .route("/api/cameras/:id", delete(delete_camera))
            // Playback routes
            .route("/api/playback/:camera_id", get(playback_status))
            .route("/api/playback/:camera_id/attach", post(playback_attach))
            .route("/api/playback/:camera_id/retry", post(playback_retry))
            .route("/api/playback/:camera_id/detach", post(playback_detach))
            // Sensor routes
            .route("/api/sensors/latest", get(latest_sensor_snapshots))
            // Audit trail
            .route("/api/audit", get(recent_audit))
            // Health
            .route("/api/health", get(health))
            .with_state(state)
            .layer(cors)
    }

    pub async fn run(&self) -> Result<()> {
        let app = Self::router(self.state.clone());

        // Build the server address
        let addr = self.config.address.clone() + ":" + &self.config.port.to_string();
        let addr: SocketAddr = addr.parse()?;

        info!("API server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;

        axum::Server::from_tcp(listener.into_std()?)?
            .serve(app.into_make_service())
            .await?;

        Ok(())
    }
}

// ---- Auth ----

#[derive(Serialize)]
struct LoginResponse {
    user: User,
    token: AuthToken,
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> ApiResult<Json<LoginResponse>> {
    let (user, token) = state.auth.login(&credentials).await?;
    Ok(Json(LoginResponse { user, token }))
}

// ---- Incidents ----

async fn list_incidents(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
) -> ApiResult<Json<Vec<IncidentWithAcknowledger>>> {
    let incidents = state.incidents.list(&actor).await?;
    Ok(Json(incidents))
}

async fn recent_incidents(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
) -> ApiResult<Json<Vec<IncidentWithAcknowledger>>> {
    let incidents = state
        .incidents
        .recent(&actor, RECENT_INCIDENT_LIMIT)
        .await?;
    Ok(Json(incidents))
}

async fn acknowledge_incident(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(id): Path<i64>,
) -> ApiResult<Json<Incident>> {
    let incident = state.incidents.acknowledge(id, &actor).await?;
    Ok(Json(incident))
}

async fn resolve_incident(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(id): Path<i64>,
) -> ApiResult<Json<Incident>> {
    let incident = state.incidents.resolve(id, &actor).await?;
    Ok(Json(incident))
}

#[derive(Serialize)]
struct SimulateResponse {
    id: i64,
    #[serde(rename = "type")]
    incident_type: String,
    severity: i32,
}

async fn simulate_incident(
    State(state): State<AppState>,
    AuthSession(_actor): AuthSession,
) -> ApiResult<Json<SimulateResponse>> {
    let incident = state.incidents.simulate().await?;
    Ok(Json(SimulateResponse {
        id: incident.id,
        incident_type: incident.incident_type.as_str().to_string(),
        severity: incident.severity.level(),
    }))
}

// ---- Users ----

#[derive(Deserialize)]
struct CreateUserRequest {
    email: String,
    username: String,
    password: String,
    role: UserRole,
}

async fn list_users(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
) -> ApiResult<Json<Vec<User>>> {
    let users = state.roster.list(&actor).await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<Json<User>> {
    if request.password.is_empty() {
        return Err(Error::Validation("Password must not be empty".to_string()).into());
    }

    let user = state
        .roster
        .create(
            &actor,
            &request.email,
            &request.username,
            &request.password,
            request.role,
        )
        .await?;
    Ok(Json(user))
}

async fn update_user(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> ApiResult<Json<User>> {
    let user = state.roster.update(&actor, &id, patch).await?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.roster.delete(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Cameras ----

async fn list_cameras(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
) -> ApiResult<Json<Vec<Camera>>> {
    authorize(actor.role, Action::ViewCameras)?;
    let cameras = state.cameras_repo.get_all().await?;
    Ok(Json(cameras))
}

async fn create_camera(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Json(request): Json<NewCamera>,
) -> ApiResult<Json<Camera>> {
    authorize(actor.role, Action::ManageCameras)?;

    let camera = Camera {
        id: Uuid::new_v4(),
        name: request.name,
        location: request.location,
        stream_url: request.stream_url,
        active: request.active,
        created_at: Utc::now(),
        created_by: Some(actor.user_id),
    };
    let created = state.cameras_repo.create(&camera).await?;

    state
        .audit_repo
        .record(
            Some(&actor.user_id),
            AuditAction::CreateCamera,
            Some("camera"),
            Some(&created.id.to_string()),
            &format!("Camera {} registered", created.name),
        )
        .await?;

    Ok(Json(created))
}

async fn update_camera(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(id): Path<Uuid>,
    Json(request): Json<NewCamera>,
) -> ApiResult<Json<Camera>> {
    authorize(actor.role, Action::ManageCameras)?;

    let mut camera = state
        .cameras_repo
        .get_by_id(&id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Camera not found: {}", id)))?;
    camera.name = request.name;
    camera.location = request.location;
    camera.stream_url = request.stream_url;
    camera.active = request.active;

    let updated = state.cameras_repo.update(&camera).await?;

    state
        .audit_repo
        .record(
            Some(&actor.user_id),
            AuditAction::UpdateCamera,
            Some("camera"),
            Some(&id.to_string()),
            &format!("Camera {} updated", updated.name),
        )
        .await?;

    Ok(Json(updated))
}

async fn delete_camera(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(actor.role, Action::ManageCameras)?;

    // Tear down any live playback session before the camera goes away
    state.playback.detach(&id).await;

    if !state.cameras_repo.delete(&id).await? {
        return Err(Error::NotFound(format!("Camera not found: {}", id)).into());
    }

    state
        .audit_repo
        .record(
            Some(&actor.user_id),
            AuditAction::DeleteCamera,
            Some("camera"),
            Some(&id.to_string()),
            &format!("Camera {} deleted", id),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SpotlightQuery {
    camera_id: Option<Uuid>,
}

async fn spotlight_view(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Query(query): Query<SpotlightQuery>,
) -> ApiResult<Json<SpotlightView>> {
    authorize(actor.role, Action::ViewCameras)?;

    let cameras = state.cameras_repo.get_active().await?;
    let requested = query.camera_id.unwrap_or_else(Uuid::nil);
    let view = select_spotlight(&requested, &cameras)
        .ok_or_else(|| Error::NotFound("No active cameras registered".to_string()))?;

    Ok(Json(view))
}

// ---- Playback ----

async fn playback_status(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(camera_id): Path<Uuid>,
) -> ApiResult<Json<CameraSession>> {
    authorize(actor.role, Action::ViewCameras)?;

    let session = state
        .playback
        .get(&camera_id)
        .await
        .ok_or_else(|| Error::NotFound(format!("No playback session for camera {}", camera_id)))?;
    Ok(Json(session))
}

async fn playback_attach(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(camera_id): Path<Uuid>,
) -> ApiResult<Json<CameraSession>> {
    authorize(actor.role, Action::ViewCameras)?;

    let camera = state
        .cameras_repo
        .get_by_id(&camera_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Camera not found: {}", camera_id)))?;

    // Playback failures land in the session state, not in the response
    // status: the tile shows the error and offers a retry.
    let session = state.playback.attach(&camera).await;
    Ok(Json(session))
}

async fn playback_retry(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(camera_id): Path<Uuid>,
) -> ApiResult<Json<CameraSession>> {
    authorize(actor.role, Action::ViewCameras)?;

    let session = state
        .playback
        .retry(&camera_id)
        .await
        .ok_or_else(|| Error::NotFound(format!("No playback session for camera {}", camera_id)))?;
    Ok(Json(session))
}

async fn playback_detach(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Path(camera_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(actor.role, Action::ViewCameras)?;

    if state.playback.detach(&camera_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("No playback session for camera {}", camera_id)).into())
    }
}

// ---- Sensors ----

async fn latest_sensor_snapshots(
    State(state): State<AppState>,
    AuthSession(_actor): AuthSession,
) -> ApiResult<Json<Vec<SensorSnapshot>>> {
    // The poller publishes over a watch channel; a read here is the latest
    // completed snapshot, or an empty vector before the first poll.
    let snapshots = state.sensor_feed.borrow().clone();
    Ok(Json(snapshots))
}

// ---- Audit ----

#[derive(Deserialize)]
struct AuditQuery {
    limit: Option<i64>,
}

async fn recent_audit(
    State(state): State<AppState>,
    AuthSession(actor): AuthSession,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    authorize(actor.role, Action::ViewAuditLog)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let entries = state.audit_repo.recent(limit).await?;
    Ok(Json(entries))
}

// ---- Health ----

#[derive(Serialize)]
struct HealthResponse {
    database: bool,
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database = state.database.health_check().await?;
    Ok(Json(HealthResponse { database }))
}
