//! Gateway webhook endpoints.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::gateway::WebhookPayload;

/// Subscription handshake: echo the challenge when the token matches.
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);

    match (mode, token) {
        (Some("subscribe"), Some(token)) if token == &*state.verify_token => {
            tracing::info!("Webhook verified");
            let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            tracing::warn!(mode = ?mode, "Webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// Message callback. Always acknowledged; processing happens off the request.
pub async fn receive(State(state): State<AppState>, body: Bytes) -> StatusCode {
    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => {
            let relay = state.relay.clone();
            tokio::spawn(async move {
                let outcomes = relay.process_payload(&payload).await;
                tracing::debug!(messages = outcomes.len(), "Webhook payload processed");
            });
        }
        Err(e) => tracing::warn!("Ignoring malformed webhook body: {}", e),
    }
    StatusCode::OK
}
