//! `/api/conversations`: the Kanban board and the attendant composer.

use super::extract::TenantContext;
use super::{PageQuery, SharedState};
use crate::domain::inputs::ConversationQuery;
use crate::domain::{
    BoardColumn, ConversationDetail, ConversationStats, ConversationStatus, ConversationView,
    DomainError, Message, OutgoingMessage, Page, Priority,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list))
        .route("/board", get(board))
        .route("/stats", get(stats))
        .route("/:id", get(get_one))
        .route("/:id/messages", get(messages).post(reply))
        .route("/:id/read", post(mark_read))
        .route("/:id/assign", post(assign).delete(unassign))
        .route("/:id/status", patch(update_status))
        .route("/:id/move", post(move_to))
        .route("/:id/priority", patch(set_priority))
        .route("/:id/tags", put(set_tags))
        .route("/:id/tags/:tag_id", post(add_tag).delete(remove_tag))
        .route("/:id/ia-lock", post(lock_ia).delete(unlock_ia))
        .route("/:id/archive", post(archive))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignBody {
    user_id: String,
}

#[derive(Deserialize)]
struct StatusBody {
    status: ConversationStatus,
}

#[derive(Deserialize)]
struct PriorityBody {
    priority: Priority,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagsBody {
    tag_ids: Vec<String>,
}

/// Composer payload: a full outgoing message or plain `{ "message": "..." }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplyBody {
    Rich(OutgoingMessage),
    Text { message: String },
}

impl From<ReplyBody> for OutgoingMessage {
    fn from(body: ReplyBody) -> Self {
        match body {
            ReplyBody::Rich(message) => message,
            ReplyBody::Text { message } => OutgoingMessage::text(message),
        }
    }
}

async fn list(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Page<ConversationView>>, DomainError> {
    Ok(Json(state.conversations.list(ctx.id(), &query).await?))
}

async fn board(
    State(state): State<SharedState>,
    ctx: TenantContext,
) -> Result<Json<Vec<BoardColumn>>, DomainError> {
    Ok(Json(state.conversations.board(ctx.id()).await?))
}

async fn stats(
    State(state): State<SharedState>,
    ctx: TenantContext,
) -> Result<Json<ConversationStats>, DomainError> {
    Ok(Json(state.conversations.stats(ctx.id()).await?))
}

async fn get_one(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetail>, DomainError> {
    Ok(Json(state.conversations.get(ctx.id(), &id).await?))
}

async fn messages(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Page<Message>>, DomainError> {
    Ok(Json(
        state
            .conversations
            .messages(ctx.id(), &id, q.page, q.limit)
            .await?,
    ))
}

async fn reply(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(body): Json<ReplyBody>,
) -> Result<(StatusCode, Json<Message>), DomainError> {
    let message = state
        .outbound
        .reply(&ctx.tenant, &id, &body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_read(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, DomainError> {
    let updated = state.conversations.mark_read(ctx.id(), &id).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn assign(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(
        state
            .conversations
            .assign(ctx.id(), &id, &body.user_id)
            .await?,
    ))
}

async fn unassign(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(state.conversations.unassign(ctx.id(), &id).await?))
}

async fn update_status(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(
        state
            .conversations
            .update_status(ctx.id(), &id, body.status)
            .await?,
    ))
}

async fn move_to(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(
        state
            .conversations
            .move_to(ctx.id(), &id, body.status, ctx.user_id.as_deref())
            .await?,
    ))
}

async fn set_priority(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(body): Json<PriorityBody>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(
        state
            .conversations
            .set_priority(ctx.id(), &id, body.priority)
            .await?,
    ))
}

async fn set_tags(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(body): Json<TagsBody>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(
        state
            .conversations
            .set_tags(ctx.id(), &id, &body.tag_ids)
            .await?,
    ))
}

async fn add_tag(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path((id, tag_id)): Path<(String, String)>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(state.conversations.add_tag(ctx.id(), &id, &tag_id).await?))
}

async fn remove_tag(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path((id, tag_id)): Path<(String, String)>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(
        state
            .conversations
            .remove_tag(ctx.id(), &id, &tag_id)
            .await?,
    ))
}

async fn lock_ia(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(state.conversations.set_ia_lock(ctx.id(), &id, true).await?))
}

async fn unlock_ia(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(state.conversations.set_ia_lock(ctx.id(), &id, false).await?))
}

async fn archive(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<ConversationView>, DomainError> {
    Ok(Json(state.conversations.archive(ctx.id(), &id).await?))
}
