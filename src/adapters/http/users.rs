//! `/api/users`: attendants of the caller's tenant.

use super::extract::TenantContext;
use super::SharedState;
use crate::domain::inputs::CreateUserInput;
use crate::domain::{DomainError, User};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one))
}

async fn list(
    State(state): State<SharedState>,
    ctx: TenantContext,
) -> Result<Json<Vec<User>>, DomainError> {
    Ok(Json(state.users.list(ctx.id()).await?))
}

async fn create(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), DomainError> {
    Ok((StatusCode::CREATED, Json(state.users.create(ctx.id(), input).await?)))
}

async fn get_one(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<User>, DomainError> {
    Ok(Json(state.users.get(ctx.id(), &id).await?))
}
