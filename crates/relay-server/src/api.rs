//! REST endpoints and the `/ws` upgrade.
//!
//! Success bodies are `{"success": true, "data": ...}`; failures are
//! `{"error": ..., "message": ...}` with a matching status code.

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use relay_core::{AccessError, AuthError, Identity, RoomId};
use relay_store::{AuthSession, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::server::AppState;
use crate::websocket::session::run_ws_session;

/// `/api` routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/join", post(join_room))
        .route("/rooms/{id}", delete(delete_room))
        .route("/rooms/{id}/count", get(room_count))
        .route("/messages", get(list_messages))
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelopes
// ─────────────────────────────────────────────────────────────────────────────

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    /// Always `true`.
    pub success: bool,
    /// Endpoint payload.
    pub data: T,
}

fn success<T: Serialize>(data: T) -> Json<ApiSuccess<T>> {
    Json(ApiSuccess { success: true, data })
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// An HTTP error with a short title and a human-readable message.
#[derive(Debug, Error)]
#[error("{error}: {message}")]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }

    fn bad_request(error: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, message)
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", message)
    }

    /// Status code this error maps to.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::InvalidUsername | StoreError::InvalidPassword | StoreError::UsernameTaken => {
                Self::bad_request("Registration failed", message)
            }
            StoreError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "Authentication failed", message)
            }
            StoreError::InvalidRoomName(_) | StoreError::RoomNameTaken => {
                Self::bad_request("Room creation failed", message)
            }
            StoreError::RoomNotFound(_) => Self::new(StatusCode::NOT_FOUND, "Not found", message),
            StoreError::InvalidInviteCode | StoreError::NotPrivateRoom => {
                Self::bad_request("Join failed", message)
            }
            StoreError::DefaultRoomProtected | StoreError::NotRoomCreator => {
                Self::new(StatusCode::FORBIDDEN, "Room deletion failed", message)
            }
            StoreError::AccessDenied(_) => Self::new(StatusCode::FORBIDDEN, "Access denied", message),
            StoreError::Auth(AuthError::Signing(_)) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Token creation failed",
                "Could not create authentication token",
            ),
            StoreError::Auth(AuthError::Hashing(_)) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password hashing failed",
                "Could not secure the password",
            ),
            StoreError::Auth(_) => Self::unauthorized("Invalid token"),
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::bad_request("Invalid JSON", e.body_text()))
}

fn parse_room_id(raw: &str, param: &str) -> Result<RoomId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid parameter", format!("{param} must be a valid number")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Authentication
// ─────────────────────────────────────────────────────────────────────────────

/// The caller identified by the `Authorization` header.
///
/// Accepts a raw token or `Bearer <token>`.
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .trim();
        if token.is_empty() {
            return Err(ApiError::unauthorized("Missing Authorization header"));
        }
        state.verifier.verify(token).map(AuthUser).map_err(|e| {
            debug!(error = %e, "rejected bearer token");
            ApiError::unauthorized("Invalid token")
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl Credentials {
    fn require(self) -> Result<Self, ApiError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ApiError::bad_request(
                "Missing fields",
                "Username and password are required",
            ));
        }
        Ok(self)
    }
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<ApiSuccess<AuthSession>>, ApiError> {
    let creds = json_body(payload)?.require()?;
    Ok(success(state.users.register(&creds.username, &creds.password)?))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<ApiSuccess<AuthSession>>, ApiError> {
    let creds = json_body(payload)?.require()?;
    Ok(success(state.users.login(&creds.username, &creds.password)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Rooms
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateRoomRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_private: bool,
}

#[derive(Deserialize)]
struct JoinRoomRequest {
    #[serde(default)]
    invite_code: String,
}

#[derive(Serialize)]
struct RoomCount {
    room_id: RoomId,
    connections: usize,
}

async fn list_rooms(AuthUser(user): AuthUser, State(state): State<AppState>) -> impl IntoResponse {
    success(state.rooms.list_accessible(user.user_id))
}

async fn create_room(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(payload)?;
    if req.name.is_empty() {
        return Err(ApiError::bad_request("Missing name", "Room name is required"));
    }
    let room = state.rooms.create_room(&req.name, req.is_private, user.user_id)?;
    Ok(success(room))
}

async fn join_room(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<JoinRoomRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(payload)?;
    if req.invite_code.is_empty() {
        return Err(ApiError::bad_request("Missing invite code", "Invite code is required"));
    }
    Ok(success(state.rooms.join_by_invite(&req.invite_code, user.user_id)?))
}

async fn delete_room(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let room_id = parse_room_id(&id, "Room id")?;
    let room = state.rooms.delete_room(room_id, user.user_id)?;
    state.hub.disconnect_room(room_id).await;
    state.hub.flush().await;
    info!(room_id = %room_id, name = %room.name, user_id = %user.user_id, "room deleted and disconnected");
    Ok(success(serde_json::json!({ "message": "Room deleted successfully" })))
}

async fn room_count(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let room_id = parse_room_id(&id, "Room id")?;
    Ok(success(RoomCount {
        room_id,
        connections: state.hub.count(room_id),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(rename = "roomId")]
    room_id: Option<String>,
    limit: Option<String>,
}

async fn list_messages(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let raw = query
        .room_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing parameter", "roomId query parameter is required"))?;
    let room_id = parse_room_id(&raw, "roomId")?;
    let limit = match query.limit.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
            ApiError::bad_request("Invalid parameter", "limit must be a non-negative number")
        })?),
    };
    if !state.rooms.check_access(room_id, user.user_id)? {
        return Err(StoreError::AccessDenied(room_id).into());
    }
    Ok(success(state.messages.history(room_id, limit)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
/// Query parameters for the WebSocket upgrade.
pub struct WsQuery {
    #[serde(rename = "roomId")]
    room_id: Option<String>,
    token: Option<String>,
}

/// GET /ws?roomId=&token=
///
/// Verifies the token and room access before upgrading. Nothing is
/// registered with the hub unless the upgrade succeeds.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match authorize_ws(&state, query).await {
        Ok((room_id, identity)) => match ws {
            Ok(ws) => {
                let deps = state.session.clone();
                ws.max_message_size(state.max_message_size)
                    .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
                    .on_upgrade(move |socket| run_ws_session(socket, room_id, identity, deps))
            }
            Err(rejection) => rejection.into_response(),
        },
        Err(e) => {
            info!(status = %e.status, message = %e.message, "websocket connection rejected");
            e.into_response()
        }
    }
}

async fn authorize_ws(state: &AppState, query: WsQuery) -> Result<(RoomId, Identity), ApiError> {
    let raw_room = query
        .room_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing parameter", "roomId query parameter is required"))?;
    let token = query
        .token
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing parameter", "token query parameter is required"))?;

    let identity = state.verifier.verify(&token).map_err(|e| {
        debug!(error = %e, "rejected websocket token");
        ApiError::unauthorized("Invalid token")
    })?;
    let room_id = parse_room_id(&raw_room, "roomId")?;

    match state.access.can_access(room_id, identity.user_id).await {
        Ok(true) => Ok((room_id, identity)),
        Ok(false) => Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "Access denied",
            "You don't have access to this room",
        )),
        Err(AccessError::RoomNotFound(_)) => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "Not found",
            format!("room {room_id} not found"),
        )),
    }
}
