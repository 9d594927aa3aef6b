//! `/api/tenants`: platform administration. Not tenant-scoped.

use super::SharedState;
use crate::domain::inputs::{
    ConfigureWhatsAppInput, CreateTenantInput, N8nWebhooksInput, TenantQuery, UpdateTenantInput,
};
use crate::domain::{DomainError, Page, Tenant, TenantCreated, WhatsAppConfigView};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).patch(update).delete(remove))
        .route("/:id/suspend", post(suspend))
        .route("/:id/activate", post(activate))
        .route("/:id/whatsapp", get(whatsapp_config).put(configure_whatsapp))
        .route("/:id/n8n", put(configure_n8n))
}

async fn list(
    State(state): State<SharedState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Page<Tenant>>, DomainError> {
    Ok(Json(state.tenants.list(&query).await?))
}

async fn create(
    State(state): State<SharedState>,
    Json(input): Json<CreateTenantInput>,
) -> Result<(StatusCode, Json<TenantCreated>), DomainError> {
    Ok((StatusCode::CREATED, Json(state.tenants.create(input).await?)))
}

async fn get_one(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Tenant>, DomainError> {
    Ok(Json(state.tenants.get(&id).await?))
}

async fn update(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateTenantInput>,
) -> Result<Json<Tenant>, DomainError> {
    Ok(Json(state.tenants.update(&id, input).await?))
}

async fn remove(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, DomainError> {
    state.tenants.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn suspend(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Tenant>, DomainError> {
    Ok(Json(state.tenants.suspend(&id).await?))
}

async fn activate(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Tenant>, DomainError> {
    Ok(Json(state.tenants.activate(&id).await?))
}

async fn whatsapp_config(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<WhatsAppConfigView>, DomainError> {
    Ok(Json(state.tenants.whatsapp_config(&id).await?))
}

async fn configure_whatsapp(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(input): Json<ConfigureWhatsAppInput>,
) -> Result<Json<WhatsAppConfigView>, DomainError> {
    Ok(Json(state.tenants.configure_whatsapp(&id, input).await?))
}

async fn configure_n8n(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(input): Json<N8nWebhooksInput>,
) -> Result<Json<Tenant>, DomainError> {
    Ok(Json(state.tenants.configure_n8n(&id, input).await?))
}

#[cfg(test)]
mod tests {
    use super::super::test_server::spawn;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn tenant_lifecycle() {
        let app = spawn().await;
        let res = app
            .client
            .post(app.at("/api/tenants"))
            .json(&json!({ "name": "Pousada Azul", "slug": "pousada-azul", "email": "Adm@Azul.test" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
        let created: Value = res.json().await.unwrap();
        assert_eq!(created["loginUrl"], "https://pousada-azul.crm.test");
        assert_eq!(created["tenant"]["status"], "TRIAL");
        let id = created["tenant"]["id"].as_str().unwrap().to_string();

        let dup = app
            .client
            .post(app.at("/api/tenants"))
            .json(&json!({ "name": "Outra", "slug": "pousada-azul", "email": "outra@azul.test" }))
            .send()
            .await
            .unwrap();
        assert_eq!(dup.status(), 400);

        let res = app
            .client
            .post(app.at(&format!("/api/tenants/{}/activate", id)))
            .send()
            .await
            .unwrap();
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["status"], "ACTIVE");

        let res = app
            .client
            .put(app.at(&format!("/api/tenants/{}/whatsapp", id)))
            .json(&json!({
                "whatsappPhoneNumberId": "PN-9",
                "whatsappAccessToken": "EAAG-secret",
                "whatsappBusinessAccountId": "WABA-9",
                "whatsappAppSecret": "app-secret"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        let cfg: Value = res.json().await.unwrap();
        assert_eq!(cfg["configured"], true);
        assert!(!cfg.to_string().contains("EAAG-secret"));

        let res = app
            .client
            .put(app.at(&format!("/api/tenants/{}/n8n", id)))
            .json(&json!({ "n8nWebhookUrl": "ftp://nope" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        let list: Value = app
            .client
            .get(app.at("/api/tenants?search=azul"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list["total"], 1);

        let res = app
            .client
            .delete(app.at(&format!("/api/tenants/{}", id)))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 204);
        let res = app
            .client
            .get(app.at(&format!("/api/tenants/{}", id)))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 404);
    }
}
