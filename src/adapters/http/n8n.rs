//! `/api/n8n`: actions the automation workflows call back into.
//!
//! Every route authenticates with `X-Api-Key: {slug}:{key}` (see [`N8nTenant`]).

use super::extract::N8nTenant;
use super::SharedState;
use crate::domain::actions::{
    IaLockQuery, SendButtonsRequest, SendListRequest, SendMediaRequest, SendTextRequest,
};
use crate::domain::inputs::EscalateInput;
use crate::domain::{DomainError, IaLockStatus, OutgoingMessage, Tenant};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/send-text", post(send_text))
        .route("/send-media", post(send_media))
        .route("/send-buttons", post(send_buttons))
        .route("/send-list", post(send_list))
        .route("/check-ia-lock", get(check_ia_lock))
        .route("/escalate", post(escalate))
}

async fn deliver(
    state: &SharedState,
    tenant: &Tenant,
    (phone, message): (String, OutgoingMessage),
) -> Result<Json<Value>, DomainError> {
    let sent = state.outbound.send(tenant, &phone, &message).await?;
    info!(tenant = %tenant.slug, message_id = %sent.id, "workflow message sent");
    Ok(Json(json!({
        "success": true,
        "messageId": sent.external_id,
        "conversationId": sent.conversation_id,
    })))
}

async fn send_text(
    State(state): State<SharedState>,
    N8nTenant(tenant): N8nTenant,
    Json(req): Json<SendTextRequest>,
) -> Result<Json<Value>, DomainError> {
    deliver(&state, &tenant, req.into_message()?).await
}

async fn send_media(
    State(state): State<SharedState>,
    N8nTenant(tenant): N8nTenant,
    Json(req): Json<SendMediaRequest>,
) -> Result<Json<Value>, DomainError> {
    deliver(&state, &tenant, req.into_message()?).await
}

async fn send_buttons(
    State(state): State<SharedState>,
    N8nTenant(tenant): N8nTenant,
    Json(req): Json<SendButtonsRequest>,
) -> Result<Json<Value>, DomainError> {
    deliver(&state, &tenant, req.into_message()?).await
}

async fn send_list(
    State(state): State<SharedState>,
    N8nTenant(tenant): N8nTenant,
    Json(req): Json<SendListRequest>,
) -> Result<Json<Value>, DomainError> {
    deliver(&state, &tenant, req.into_message()?).await
}

async fn check_ia_lock(
    State(state): State<SharedState>,
    N8nTenant(tenant): N8nTenant,
    Query(q): Query<IaLockQuery>,
) -> Result<Json<IaLockStatus>, DomainError> {
    Ok(Json(
        state
            .conversations
            .ia_lock_by_phone(&tenant.id, q.phone()?)
            .await?,
    ))
}

async fn escalate(
    State(state): State<SharedState>,
    N8nTenant(tenant): N8nTenant,
    Json(input): Json<EscalateInput>,
) -> Result<(StatusCode, Json<Value>), DomainError> {
    let conversation = state.conversations.escalate(&tenant.id, &input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "conversation": conversation })),
    ))
}
