//! `/api/contacts` and `/api/organizations`.

use super::extract::TenantContext;
use super::{SearchQuery, SharedState};
use crate::domain::inputs::{
    BulkImportInput, ContactQuery, CreateContactInput, CreateOrganizationInput,
    UpdateContactInput, UpdateOrganizationInput,
};
use crate::domain::{Contact, DomainError, ImportResult, Organization, Page};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/export", get(export_csv))
        .route("/import", post(import_csv))
        .route("/bulk", post(bulk_import))
        .route("/by-phone/:phone", get(by_phone))
        .route("/:id", get(get_one).patch(update).delete(remove))
}

pub(super) fn organization_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_organizations).post(create_organization))
        .route(
            "/:id",
            get(get_organization)
                .patch(update_organization)
                .delete(delete_organization),
        )
        .route(
            "/:id/contacts/:contact_id",
            post(link_contact).delete(unlink_contact),
        )
}

async fn list(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(query): Query<ContactQuery>,
) -> Result<Json<Page<Contact>>, DomainError> {
    Ok(Json(state.contacts.list(ctx.id(), &query).await?))
}

async fn create(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Json(input): Json<CreateContactInput>,
) -> Result<(StatusCode, Json<Contact>), DomainError> {
    Ok((StatusCode::CREATED, Json(state.contacts.create(ctx.id(), input).await?)))
}

async fn get_one(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<Contact>, DomainError> {
    Ok(Json(state.contacts.get(ctx.id(), &id).await?))
}

async fn by_phone(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(phone): Path<String>,
) -> Result<Json<Contact>, DomainError> {
    Ok(Json(state.contacts.get_by_phone(ctx.id(), &phone).await?))
}

async fn update(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(input): Json<UpdateContactInput>,
) -> Result<Json<Contact>, DomainError> {
    Ok(Json(state.contacts.update(ctx.id(), &id, input).await?))
}

async fn remove(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<StatusCode, DomainError> {
    state.contacts.delete(ctx.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bulk_import(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Json(input): Json<BulkImportInput>,
) -> Result<Json<ImportResult>, DomainError> {
    Ok(Json(state.contacts.bulk_import(ctx.id(), input).await?))
}

/// Raw CSV body with a header row.
async fn import_csv(
    State(state): State<SharedState>,
    ctx: TenantContext,
    body: String,
) -> Result<Json<ImportResult>, DomainError> {
    Ok(Json(state.contacts.import_csv(ctx.id(), &body).await?))
}

async fn export_csv(
    State(state): State<SharedState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, DomainError> {
    let csv = state.contacts.export_csv(ctx.id()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"contacts.csv\""),
        ],
        csv,
    ))
}

async fn list_organizations(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<Organization>>, DomainError> {
    Ok(Json(
        state
            .contacts
            .list_organizations(ctx.id(), q.search.as_deref())
            .await?,
    ))
}

async fn create_organization(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Json(input): Json<CreateOrganizationInput>,
) -> Result<(StatusCode, Json<Organization>), DomainError> {
    let org = state.contacts.create_organization(ctx.id(), input).await?;
    Ok((StatusCode::CREATED, Json(org)))
}

async fn get_organization(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<Organization>, DomainError> {
    Ok(Json(state.contacts.get_organization(ctx.id(), &id).await?))
}

async fn update_organization(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(input): Json<UpdateOrganizationInput>,
) -> Result<Json<Organization>, DomainError> {
    Ok(Json(
        state
            .contacts
            .update_organization(ctx.id(), &id, input)
            .await?,
    ))
}

async fn delete_organization(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<StatusCode, DomainError> {
    state.contacts.delete_organization(ctx.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn link_contact(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path((id, contact_id)): Path<(String, String)>,
) -> Result<Json<Contact>, DomainError> {
    Ok(Json(
        state
            .contacts
            .link_contact(ctx.id(), &id, &contact_id)
            .await?,
    ))
}

async fn unlink_contact(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Path((id, contact_id)): Path<(String, String)>,
) -> Result<Json<Contact>, DomainError> {
    Ok(Json(
        state
            .contacts
            .unlink_contact(ctx.id(), &id, &contact_id)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_server::spawn;
    use crate::adapters::persistence::sqlite_repo::test_support::tenant;
    use reqwest::Method;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn contacts_crud_import_and_export() {
        let app = spawn().await;
        let t = app.tenant(tenant("hotel-http-contacts")).await;

        let res = app
            .as_tenant(Method::POST, "/api/contacts", &t)
            .json(&json!({ "phoneNumber": "+55 (11) 98888-7777" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        let res = app
            .as_tenant(Method::POST, "/api/contacts", &t)
            .json(&json!({ "phoneNumber": "5511988887777", "name": "Ana" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
        let ana: Value = res.json().await.unwrap();
        assert_eq!(ana["phoneNumber"], "5511988887777");
        let ana_id = ana["id"].as_str().unwrap().to_string();

        let dup = app
            .as_tenant(Method::POST, "/api/contacts", &t)
            .json(&json!({ "phoneNumber": "5511988887777" }))
            .send()
            .await
            .unwrap();
        assert_eq!(dup.status(), 400);

        let found: Value = app
            .as_tenant(Method::GET, "/api/contacts/by-phone/+5511988887777", &t)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(found["id"], ana_id.as_str());

        let imported: Value = app
            .as_tenant(Method::POST, "/api/contacts/import", &t)
            .body("phoneNumber,name,email\n5511977776666,Bruno,bruno@mail.test\n5511988887777,Ana,\n")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(imported["created"], 1);
        assert_eq!(imported["skipped"], 1);

        let res = app
            .as_tenant(Method::GET, "/api/contacts/export", &t)
            .send()
            .await
            .unwrap();
        assert_eq!(res.headers()["content-type"], "text/csv; charset=utf-8");
        let csv = res.text().await.unwrap();
        assert!(csv.starts_with("id,name,phoneNumber"));
        assert!(csv.contains("Bruno"));

        let page: Value = app
            .as_tenant(Method::GET, "/api/contacts?sortBy=name&sortOrder=asc", &t)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(page["total"], 2);
        assert_eq!(page["data"][0]["name"], "Ana");

        let res = app
            .as_tenant(Method::DELETE, &format!("/api/contacts/{}", ana_id), &t)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 204);
    }

    #[tokio::test]
    async fn contacts_are_tenant_scoped() {
        let app = spawn().await;
        let a = app.tenant(tenant("hotel-http-a")).await;
        let b = app.tenant(tenant("hotel-http-b")).await;
        let created: Value = app
            .as_tenant(Method::POST, "/api/contacts", &a)
            .json(&json!({ "phoneNumber": "5511966665555" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let res = app
            .as_tenant(
                Method::GET,
                &format!("/api/contacts/{}", created["id"].as_str().unwrap()),
                &b,
            )
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn organizations_link_contacts() {
        let app = spawn().await;
        let t = app.tenant(tenant("hotel-http-orgs")).await;
        let org: Value = app
            .as_tenant(Method::POST, "/api/organizations", &t)
            .json(&json!({ "name": "Agência Sol" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let contact: Value = app
            .as_tenant(Method::POST, "/api/contacts", &t)
            .json(&json!({ "phoneNumber": "5511955554444" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let path = format!(
            "/api/organizations/{}/contacts/{}",
            org["id"].as_str().unwrap(),
            contact["id"].as_str().unwrap()
        );

        let linked: Value = app
            .as_tenant(Method::POST, &path, &t)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(linked["organizationId"], org["id"]);

        let fetched: Value = app
            .as_tenant(
                Method::GET,
                &format!("/api/organizations/{}", org["id"].as_str().unwrap()),
                &t,
            )
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["contactsCount"], 1);

        let res = app.as_tenant(Method::DELETE, &path, &t).send().await.unwrap();
        assert_eq!(res.status(), 200);
        let res = app.as_tenant(Method::DELETE, &path, &t).send().await.unwrap();
        assert_eq!(res.status(), 400);
    }
}
