//! API endpoints for agents.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::core::{ProxyStatus, Registration};
use crate::protocol::Envelope;
use crate::web::AppState;

/// Register agent request.
#[derive(Deserialize)]
pub struct RegisterAgentRequest {
    pub id: String,
}

/// Send response.
#[derive(Serialize)]
pub struct SendResponse {
    pub agent_id: String,
    pub connected: bool,
    pub outbound_pending: usize,
}

/// List all agents.
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<ProxyStatus>> {
    Json(state.matrix.registry().snapshot())
}

/// Get a single agent.
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProxyStatus>, StatusCode> {
    let proxy = state.matrix.registry().lookup(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(proxy.status()))
}

/// Provision a new agent identity.
pub async fn register_agent(
    State(state): State<AppState>,
    Json(payload): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<ProxyStatus>), StatusCode> {
    let registration = state.matrix.registry().insert(&payload.id).map_err(|e| {
        tracing::warn!("Refused to register '{}': {}", payload.id, e);
        StatusCode::BAD_REQUEST
    })?;

    match registration {
        Registration::Created(proxy) => {
            tracing::info!("Registered agent via API: {}", payload.id);
            Ok((StatusCode::CREATED, Json(proxy.status())))
        }
        Registration::Existing(_) => Err(StatusCode::CONFLICT),
    }
}

/// Decommission an agent. Its live connection, if any, is closed.
pub async fn decommission_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    match state.matrix.registry().decommission(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// Queue an envelope for an agent, connected or not. Its `dst` must be
/// that agent.
pub async fn send_to_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(envelope): Json<Envelope>,
) -> Result<(StatusCode, Json<SendResponse>), StatusCode> {
    let proxy = state.matrix.registry().lookup(&id).ok_or(StatusCode::NOT_FOUND)?;
    if envelope.destination != id {
        tracing::warn!(
            "Refused envelope for '{}' posted to agent '{}'",
            envelope.destination,
            id
        );
        return Err(StatusCode::BAD_REQUEST);
    }
    proxy.send(envelope);

    Ok((
        StatusCode::ACCEPTED,
        Json(SendResponse {
            agent_id: id,
            connected: proxy.is_connected(),
            outbound_pending: proxy.outbound().len(),
        }),
    ))
}
