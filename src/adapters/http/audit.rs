//! `/api/audit-logs`.

use super::extract::TenantContext;
use super::SharedState;
use crate::domain::inputs::AuditLogQuery;
use crate::domain::{AuditLog, DomainError, Page};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list))
        .route("/:id", get(get_one))
}

async fn list(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Page<AuditLog>>, DomainError> {
    Ok(Json(state.audit.list(ctx.id(), &query).await?))
}

async fn get_one(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<AuditLog>, DomainError> {
    Ok(Json(state.audit.get(ctx.id(), &id).await?))
}

#[cfg(test)]
mod tests {
    use super::super::test_server::{spawn, TestApp};
    use crate::adapters::persistence::sqlite_repo::test_support::tenant;
    use crate::domain::Tenant;
    use reqwest::Method;
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn logs(app: &TestApp, t: &Tenant, query: &str) -> Value {
        app.as_tenant(Method::GET, &format!("/api/audit-logs{}", query), t)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn tag_changes_show_up_in_the_trail() {
        let app = spawn().await;
        let t = app.tenant(tenant("hotel-audit")).await;
        app.as_tenant(Method::POST, "/api/tags", &t)
            .json(&json!({ "name": "Família", "color": "#123456" }))
            .send()
            .await
            .unwrap();

        // Entries are written on a background task.
        let mut page = logs(&app, &t, "?entity=Tag").await;
        for _ in 0..50 {
            if page["total"] == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            page = logs(&app, &t, "?entity=Tag").await;
        }
        assert_eq!(page["total"], 1);
        let entry = &page["data"][0];
        assert_eq!(entry["action"], "CREATE");
        assert_eq!(entry["newData"]["name"], "Família");

        let id = entry["id"].as_str().unwrap();
        let one: Value = app
            .as_tenant(Method::GET, &format!("/api/audit-logs/{}", id), &t)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(one["entity"], "Tag");

        let other = app.tenant(tenant("hotel-audit-other")).await;
        let res = app
            .as_tenant(Method::GET, &format!("/api/audit-logs/{}", id), &other)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 404);

        let empty = logs(&app, &t, "?action=DELETE").await;
        assert_eq!(empty["total"], 0);
    }
}
