//! Meta webhooks: `/webhooks/whatsapp`, `/webhooks/messenger`, `/webhooks/instagram`.
//!
//! Every accepted POST answers `200 EVENT_RECEIVED` right away; the batch is
//! processed on a spawned task so Meta never waits on the inbox or N8N.

use super::SharedState;
use crate::adapters::meta::messaging::{self, parse_messaging};
use crate::adapters::whatsapp::mapper;
use crate::adapters::whatsapp::signature::{verify_signature, SIGNATURE_HEADER};
use crate::adapters::whatsapp::webhook::{parse_envelope, verify_subscription};
use crate::domain::{Channel, DomainError, Tenant};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::{debug, info, warn};

const EVENT_RECEIVED: &str = "EVENT_RECEIVED";
const TENANT_SLUG_HEADER: &str = "x-tenant-slug";

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/whatsapp", get(whatsapp_verify).post(whatsapp_event))
        .route("/messenger", get(messenger_verify).post(messenger_event))
        .route("/instagram", get(instagram_verify).post(instagram_event))
}

#[derive(Debug, Default, Deserialize)]
struct HubQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
    tenant: Option<String>,
}

impl HubQuery {
    fn answer(&self, expected: &str) -> Result<String, DomainError> {
        verify_subscription(
            self.mode.as_deref(),
            self.verify_token.as_deref(),
            self.challenge.as_deref(),
            expected,
        )
        .ok_or_else(|| DomainError::Forbidden("Verification failed".into()))
    }
}

/// Tenant slug from `X-Tenant-Slug` or `?tenant=`.
fn tenant_slug<'a>(headers: &'a HeaderMap, query: &'a HubQuery) -> Option<&'a str> {
    headers
        .get(TENANT_SLUG_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(query.tenant.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

async fn whatsapp_verify(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(q): Query<HubQuery>,
) -> Result<String, DomainError> {
    let slug = tenant_slug(&headers, &q)
        .ok_or_else(|| DomainError::Forbidden("Tenant not specified".into()))?;
    let tenant = state
        .tenants
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| DomainError::Forbidden("Verification failed".into()))?;
    let challenge = q.answer(&tenant.whatsapp_webhook_verify_token)?;
    info!(tenant = %tenant.slug, "whatsapp webhook verified");
    Ok(challenge)
}

/// Slug first, then the `phone_number_id` the event was sent to.
async fn resolve_whatsapp_tenant(
    state: &SharedState,
    slug: Option<&str>,
    body: &[u8],
) -> Result<Option<Tenant>, DomainError> {
    if let Some(slug) = slug {
        return state.tenants.find_by_slug(slug).await;
    }
    let Ok(envelope) = parse_envelope(body) else {
        return Ok(None);
    };
    match envelope.phone_number_id() {
        Some(id) => {
            state
                .tenants
                .find_by_channel_account(Channel::WhatsApp, id)
                .await
        }
        None => Ok(None),
    }
}

async fn whatsapp_event(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(q): Query<HubQuery>,
    body: Bytes,
) -> Result<(StatusCode, &'static str), DomainError> {
    let slug = tenant_slug(&headers, &q);
    let Some(tenant) = resolve_whatsapp_tenant(&state, slug, &body).await? else {
        warn!(slug = slug.unwrap_or("-"), "whatsapp event for unknown tenant ignored");
        return Ok((StatusCode::OK, EVENT_RECEIVED));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| DomainError::Forbidden("Missing signature".into()))?;
    let Some(secret) = tenant
        .whatsapp_app_secret
        .as_deref()
        .filter(|s| !s.is_empty())
    else {
        warn!(tenant = %tenant.slug, "no app secret configured, whatsapp event skipped");
        return Ok((StatusCode::OK, EVENT_RECEIVED));
    };
    if !verify_signature(secret, &body, signature) {
        warn!(tenant = %tenant.slug, "whatsapp webhook signature mismatch");
        return Err(DomainError::Forbidden("Invalid signature".into()));
    }

    let envelope = parse_envelope(&body)?;
    let batch = mapper::to_batch(&envelope);
    tokio::spawn(async move {
        let report = state.inbox.receive(&tenant, batch).await;
        debug!(tenant = %tenant.slug, ?report, "whatsapp batch processed");
    });
    Ok((StatusCode::OK, EVENT_RECEIVED))
}

async fn messenger_verify(
    State(state): State<SharedState>,
    Query(q): Query<HubQuery>,
) -> Result<String, DomainError> {
    q.answer(&state.messenger_verify_token)
}

async fn instagram_verify(
    State(state): State<SharedState>,
    Query(q): Query<HubQuery>,
) -> Result<String, DomainError> {
    q.answer(&state.instagram_verify_token)
}

async fn messenger_event(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<(StatusCode, &'static str), DomainError> {
    messaging_event(state, Channel::Messenger, &body)
}

async fn instagram_event(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<(StatusCode, &'static str), DomainError> {
    messaging_event(state, Channel::Instagram, &body)
}

/// Each entry belongs to the tenant whose page / account id matches `entry.id`.
fn messaging_event(
    state: SharedState,
    channel: Channel,
    body: &[u8],
) -> Result<(StatusCode, &'static str), DomainError> {
    let envelope = parse_messaging(body, channel)?;
    tokio::spawn(async move {
        for entry in &envelope.entry {
            let tenant = match state.tenants.find_by_channel_account(channel, &entry.id).await {
                Ok(Some(t)) => t,
                Ok(None) => {
                    warn!(channel = %channel, account_id = %entry.id, "event for unknown account ignored");
                    continue;
                }
                Err(e) => {
                    warn!(channel = %channel, account_id = %entry.id, error = %e, "tenant lookup failed");
                    continue;
                }
            };
            let report = state
                .inbox
                .receive(&tenant, messaging::to_batch(channel, entry))
                .await;
            debug!(tenant = %tenant.slug, channel = %channel, ?report, "messaging batch processed");
        }
    });
    Ok((StatusCode::OK, EVENT_RECEIVED))
}

#[cfg(test)]
mod tests {
    use super::super::test_server::{spawn, TestApp};
    use crate::adapters::persistence::sqlite_repo::test_support::tenant;
    use crate::adapters::whatsapp::signature::sign;
    use crate::domain::{Channel, Contact};
    use crate::ports::ContactRepo;
    use serde_json::json;
    use std::time::Duration;

    fn whatsapp_body(phone_number_id: &str, from: &str, id: &str) -> String {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{ "id": "WABA-1", "changes": [{ "field": "messages", "value": {
                "messaging_product": "whatsapp",
                "metadata": { "phone_number_id": phone_number_id },
                "contacts": [{ "profile": { "name": "Joana" }, "wa_id": from }],
                "messages": [{ "from": from, "id": id, "timestamp": "1700000000",
                    "type": "text", "text": { "body": "Quero reservar" } }]
            } }] }]
        })
        .to_string()
    }

    async fn wait_for_contact(
        app: &TestApp,
        tenant_id: &str,
        channel: Channel,
        external_id: &str,
    ) -> Option<Contact> {
        for _ in 0..100 {
            if let Some(c) = app
                .repo
                .find_contact_by_external(tenant_id, channel, external_id)
                .await
                .unwrap()
            {
                return Some(c);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }

    #[tokio::test]
    async fn whatsapp_handshake_echoes_the_challenge() {
        let app = spawn().await;
        let t = app.tenant(tenant("hotel-hook")).await;

        let ok = app
            .client
            .get(app.at("/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=verify&hub.challenge=42&tenant=hotel-hook"))
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status(), 200);
        assert_eq!(ok.text().await.unwrap(), "42");

        let wrong = app
            .client
            .get(app.at("/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=42"))
            .header("x-tenant-slug", &t.slug)
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), 403);

        let anonymous = app
            .client
            .get(app.at("/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=verify&hub.challenge=42"))
            .send()
            .await
            .unwrap();
        assert_eq!(anonymous.status(), 403);
    }

    #[tokio::test]
    async fn signed_events_reach_the_inbox() {
        let app = spawn().await;
        let t = app.whatsapp_tenant("hotel-hook-in").await;
        let body = whatsapp_body(t.whatsapp_phone_number_id.as_deref().unwrap(), "5511955550000", "wamid.IN1");

        let unsigned = app
            .client
            .post(app.at("/webhooks/whatsapp?tenant=hotel-hook-in"))
            .body(body.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(unsigned.status(), 403);

        let forged = app
            .client
            .post(app.at("/webhooks/whatsapp?tenant=hotel-hook-in"))
            .header("x-hub-signature-256", sign("other-secret", body.as_bytes()))
            .body(body.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(forged.status(), 403);

        // No slug: the tenant is found by phone_number_id.
        let res = app
            .client
            .post(app.at("/webhooks/whatsapp"))
            .header("x-hub-signature-256", sign("app-secret", body.as_bytes()))
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.unwrap(), "EVENT_RECEIVED");

        let contact = wait_for_contact(&app, &t.id, Channel::WhatsApp, "5511955550000")
            .await
            .expect("contact stored");
        assert_eq!(contact.name.as_deref(), Some("Joana"));
    }

    #[tokio::test]
    async fn bad_payloads_and_unknown_tenants() {
        let app = spawn().await;
        app.whatsapp_tenant("hotel-hook-bad").await;

        let junk = b"{\"object\":\"page\",\"entry\":[]}";
        let res = app
            .client
            .post(app.at("/webhooks/whatsapp?tenant=hotel-hook-bad"))
            .header("x-hub-signature-256", sign("app-secret", junk))
            .body(junk.to_vec())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        let body = whatsapp_body("PN-unknown", "5511955550001", "wamid.IN2");
        let res = app
            .client
            .post(app.at("/webhooks/whatsapp"))
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }

    #[tokio::test]
    async fn messenger_events_route_by_page_id() {
        let app = spawn().await;
        let mut t = tenant("hotel-page");
        t.messenger_page_id = Some("PAGE-1".into());
        let t = app.tenant(t).await;

        let ok = app
            .client
            .get(app.at("/webhooks/messenger?hub.mode=subscribe&hub.verify_token=messenger-token&hub.challenge=abc"))
            .send()
            .await
            .unwrap();
        assert_eq!(ok.text().await.unwrap(), "abc");
        let denied = app
            .client
            .get(app.at("/webhooks/instagram?hub.mode=subscribe&hub.verify_token=messenger-token&hub.challenge=abc"))
            .send()
            .await
            .unwrap();
        assert_eq!(denied.status(), 403);

        let body = json!({
            "object": "page",
            "entry": [{ "id": "PAGE-1", "messaging": [{
                "sender": { "id": "PSID-9" },
                "timestamp": 1700000000000i64,
                "message": { "mid": "m.1", "text": "Tem vaga?" }
            }] }]
        });
        let res = app
            .client
            .post(app.at("/webhooks/messenger"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        assert!(wait_for_contact(&app, &t.id, Channel::Messenger, "PSID-9").await.is_some());

        let wrong_object = app
            .client
            .post(app.at("/webhooks/instagram"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(wrong_object.status(), 400);
    }
}
