//! `/api/tags` and `/api/quick-replies`.

use super::extract::TenantContext;
use super::{SearchQuery, SharedState};
use crate::domain::inputs::{
    CreateQuickReplyInput, CreateTagInput, QuickReplyQuery, UpdateQuickReplyInput, UpdateTagInput,
};
use crate::domain::{DomainError, QuickReply, Tag};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

pub(super) fn tag_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_tags).post(create_tag))
        .route("/:id", get(get_tag).patch(update_tag).delete(delete_tag))
}

pub(super) fn quick_reply_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_replies).post(create_reply))
        .route("/expand", get(expand_reply))
        .route(
            "/:id",
            get(get_reply).patch(update_reply).delete(delete_reply),
        )
}

async fn list_tags(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<Tag>>, DomainError> {
    Ok(Json(state.tags.list(ctx.id(), q.search.as_deref()).await?))
}

async fn create_tag(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Json(input): Json<CreateTagInput>,
) -> Result<(StatusCode, Json<Tag>), DomainError> {
    Ok((StatusCode::CREATED, Json(state.tags.create(ctx.id(), input).await?)))
}

async fn get_tag(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<Tag>, DomainError> {
    Ok(Json(state.tags.get(ctx.id(), &id).await?))
}

async fn update_tag(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(input): Json<UpdateTagInput>,
) -> Result<Json<Tag>, DomainError> {
    Ok(Json(state.tags.update(ctx.id(), &id, input).await?))
}

async fn delete_tag(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<StatusCode, DomainError> {
    state.tags.delete(ctx.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_replies(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(query): Query<QuickReplyQuery>,
) -> Result<Json<Vec<QuickReply>>, DomainError> {
    Ok(Json(state.quick_replies.list(ctx.id(), &query).await?))
}

async fn create_reply(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Json(input): Json<CreateQuickReplyInput>,
) -> Result<(StatusCode, Json<QuickReply>), DomainError> {
    let reply = state
        .quick_replies
        .create(ctx.id(), ctx.user_id.as_deref(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

#[derive(Deserialize)]
struct ExpandQuery {
    shortcut: String,
}

async fn expand_reply(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(q): Query<ExpandQuery>,
) -> Result<Json<QuickReply>, DomainError> {
    Ok(Json(state.quick_replies.expand(ctx.id(), &q.shortcut).await?))
}

async fn get_reply(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<QuickReply>, DomainError> {
    Ok(Json(state.quick_replies.get(ctx.id(), &id).await?))
}

async fn update_reply(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(input): Json<UpdateQuickReplyInput>,
) -> Result<Json<QuickReply>, DomainError> {
    Ok(Json(state.quick_replies.update(ctx.id(), &id, input).await?))
}

async fn delete_reply(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<StatusCode, DomainError> {
    state.quick_replies.delete(ctx.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::test_server::spawn;
    use crate::adapters::persistence::sqlite_repo::test_support::tenant;
    use reqwest::Method;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn tag_names_are_unique_per_tenant() {
        let app = spawn().await;
        let a = app.tenant(tenant("hotel-tags-a")).await;
        let b = app.tenant(tenant("hotel-tags-b")).await;
        let vip = json!({ "name": "VIP", "color": "#ff5733" });

        let res = app
            .as_tenant(Method::POST, "/api/tags", &a)
            .json(&vip)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
        let tag: Value = res.json().await.unwrap();
        assert_eq!(tag["color"], "#FF5733");

        let again = app
            .as_tenant(Method::POST, "/api/tags", &a)
            .json(&vip)
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), 400);

        let other = app
            .as_tenant(Method::POST, "/api/tags", &b)
            .json(&vip)
            .send()
            .await
            .unwrap();
        assert_eq!(other.status(), 201);

        let bad = app
            .as_tenant(Method::POST, "/api/tags", &a)
            .json(&json!({ "name": "Red", "color": "red" }))
            .send()
            .await
            .unwrap();
        assert_eq!(bad.status(), 400);

        let list: Value = app
            .as_tenant(Method::GET, "/api/tags?search=vi", &a)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quick_replies_expand_by_shortcut() {
        let app = spawn().await;
        let t = app.tenant(tenant("hotel-replies")).await;
        let res = app
            .as_tenant(Method::POST, "/api/quick-replies", &t)
            .header("x-user-id", "attendant-1")
            .json(&json!({
                "title": "Check-in",
                "shortcut": "checkin",
                "content": "Check-in a partir das 14h."
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
        let reply: Value = res.json().await.unwrap();
        assert_eq!(reply["createdById"], "attendant-1");
        let id = reply["id"].as_str().unwrap().to_string();

        let expanded: Value = app
            .as_tenant(Method::GET, "/api/quick-replies/expand?shortcut=/checkin", &t)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(expanded["content"], "Check-in a partir das 14h.");

        let res = app
            .as_tenant(Method::PATCH, &format!("/api/quick-replies/{}", id), &t)
            .json(&json!({ "isActive": false }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);

        let res = app
            .as_tenant(Method::GET, "/api/quick-replies/expand?shortcut=checkin", &t)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 404);
    }
}
