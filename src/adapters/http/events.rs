//! `GET /api/events`: server-sent events for the caller's tenant.

use super::extract::TenantContext;
use super::SharedState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

pub(super) async fn stream(
    State(state): State<SharedState>,
    ctx: TenantContext,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let tenant_id = ctx.tenant.id;
    debug!(tenant_id = %tenant_id, "event stream opened");
    let events = BroadcastStream::new(state.events.subscribe()).filter_map(move |item| {
        let tenant_id = tenant_id.clone();
        async move {
            match item {
                Ok(e) if e.tenant_id == tenant_id => {
                    match Event::default().event(&e.event).json_data(&e.payload) {
                        Ok(event) => Some(Ok(event)),
                        Err(err) => {
                            warn!(event = %e.event, error = %err, "event not serializable");
                            None
                        }
                    }
                }
                Ok(_) => None,
                Err(lagged) => {
                    warn!(tenant_id = %tenant_id, error = %lagged, "event stream lagged");
                    None
                }
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::super::test_server::spawn;
    use crate::adapters::persistence::sqlite_repo::test_support::tenant;
    use crate::ports::{CrmEvent, EventPublisher};
    use reqwest::Method;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn streams_only_the_callers_events() {
        let app = spawn().await;
        let t = app.tenant(tenant("hotel-sse")).await;
        let mut res = app
            .as_tenant(Method::GET, "/api/events", &t)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        assert!(res.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        app.state
            .events
            .publish(CrmEvent::new("someone-else", "message:new", json!({ "id": "x" })));
        app.state.events.publish(CrmEvent::new(
            &t.id,
            "conversation:updated",
            json!({ "id": "c-1" }),
        ));

        let mut body = String::new();
        while !body.contains("c-1") {
            let chunk = tokio::time::timeout(Duration::from_secs(5), res.chunk())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            body.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(body.contains("event: conversation:updated"));
        assert!(!body.contains("message:new"));
    }
}
