//! WhatsApp Cloud API client. Implements `WhatsAppGateway` over the Graph API.

use crate::domain::{DomainError, OutgoingMessage};
use crate::ports::{WhatsAppCredentials, WhatsAppGateway};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct WhatsAppCloudClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentId>,
}

#[derive(Deserialize)]
struct SentId {
    id: String,
}

#[derive(Deserialize)]
struct MediaInfo {
    url: String,
}

impl WhatsAppCloudClient {
    /// `base_url` is the versioned Graph API root, e.g. `https://graph.facebook.com/v21.0`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn optional_text(text: &Option<String>) -> Option<Value> {
    text.as_ref().map(|t| json!({ "text": t }))
}

/// Graph API request body for one outgoing message.
pub fn message_body(to: &str, message: &OutgoingMessage) -> Value {
    let mut body = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
    });
    match message {
        OutgoingMessage::Text { body: text } => {
            body["type"] = json!("text");
            body["text"] = json!({ "preview_url": false, "body": text });
        }
        OutgoingMessage::Media {
            kind,
            url,
            caption,
            filename,
        } => {
            let mut media = json!({ "link": url });
            if let Some(c) = caption.as_ref().filter(|_| kind.as_str() != "audio") {
                media["caption"] = json!(c);
            }
            if let Some(f) = filename.as_ref().filter(|_| kind.as_str() == "document") {
                media["filename"] = json!(f);
            }
            body["type"] = json!(kind.as_str());
            body[kind.as_str()] = media;
        }
        OutgoingMessage::Buttons {
            body: text,
            buttons,
            header,
            footer,
        } => {
            let buttons: Vec<Value> = buttons
                .iter()
                .map(|b| json!({ "type": "reply", "reply": { "id": b.id, "title": b.title } }))
                .collect();
            let mut interactive = json!({
                "type": "button",
                "body": { "text": text },
                "action": { "buttons": buttons },
            });
            if let Some(h) = header {
                interactive["header"] = json!({ "type": "text", "text": h });
            }
            if let Some(f) = optional_text(footer) {
                interactive["footer"] = f;
            }
            body["type"] = json!("interactive");
            body["interactive"] = interactive;
        }
        OutgoingMessage::List {
            body: text,
            button,
            sections,
            header,
            footer,
        } => {
            let mut interactive = json!({
                "type": "list",
                "body": { "text": text },
                "action": { "button": button, "sections": sections },
            });
            if let Some(h) = header {
                interactive["header"] = json!({ "type": "text", "text": h });
            }
            if let Some(f) = optional_text(footer) {
                interactive["footer"] = f;
            }
            body["type"] = json!("interactive");
            body["interactive"] = interactive;
        }
    }
    body
}

async fn api_error(res: reqwest::Response) -> DomainError {
    let status = res.status();
    let text = res.text().await.unwrap_or_else(|_| "unknown".to_string());
    let detail = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    DomainError::Gateway(format!("WhatsApp API error {}: {}", status, detail))
}

#[async_trait::async_trait]
impl WhatsAppGateway for WhatsAppCloudClient {
    async fn send_message(
        &self,
        credentials: &WhatsAppCredentials,
        to: &str,
        message: &OutgoingMessage,
    ) -> Result<String, DomainError> {
        let url = format!("{}/{}/messages", self.base_url, credentials.phone_number_id);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&credentials.access_token)
            .json(&message_body(to, message))
            .send()
            .await
            .map_err(|e| DomainError::Gateway(format!("Request failed: {}", e)))?;

        if !res.status().is_success() {
            return Err(api_error(res).await);
        }

        let sent: SendResponse = res
            .json()
            .await
            .map_err(|e| DomainError::Gateway(format!("Invalid response: {}", e)))?;
        sent.messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| DomainError::Gateway("WhatsApp API returned no message id".into()))
    }

    async fn media_url(
        &self,
        credentials: &WhatsAppCredentials,
        media_id: &str,
    ) -> Result<String, DomainError> {
        let url = format!("{}/{}", self.base_url, media_id);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&credentials.access_token)
            .send()
            .await
            .map_err(|e| DomainError::Gateway(format!("Request failed: {}", e)))?;

        if !res.status().is_success() {
            return Err(api_error(res).await);
        }

        let info: MediaInfo = res
            .json()
            .await
            .map_err(|e| DomainError::Gateway(format!("Invalid response: {}", e)))?;
        Ok(info.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ListRow, ListSection, MediaKind, ReplyButton};
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    async fn graph_stub() -> (String, Seen) {
        async fn send(
            State(seen): State<Seen>,
            Path(phone_id): Path<String>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> (StatusCode, Json<Value>) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if auth != "Bearer good-token" {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "Invalid OAuth access token" } })),
                );
            }
            seen.lock().unwrap().push((phone_id, body));
            (
                StatusCode::OK,
                Json(json!({ "messages": [{ "id": "wamid.SENT" }] })),
            )
        }
        async fn media(Path(id): Path<String>) -> Json<Value> {
            Json(json!({ "url": format!("https://cdn.example/{}", id) }))
        }

        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/:phone_id/messages", post(send))
            .route("/:id", get(media))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    fn creds(token: &str) -> WhatsAppCredentials {
        WhatsAppCredentials {
            phone_number_id: "PN-1".into(),
            access_token: token.into(),
        }
    }

    #[tokio::test]
    async fn sends_text_and_returns_wamid() {
        let (url, seen) = graph_stub().await;
        let client = WhatsAppCloudClient::new(url);
        let id = client
            .send_message(&creds("good-token"), "5511999999999", &OutgoingMessage::text("Oi"))
            .await
            .unwrap();
        assert_eq!(id, "wamid.SENT");
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "PN-1");
        assert_eq!(seen[0].1["text"]["body"], "Oi");
        assert_eq!(seen[0].1["to"], "5511999999999");
    }

    #[tokio::test]
    async fn api_errors_become_gateway_errors() {
        let (url, _) = graph_stub().await;
        let client = WhatsAppCloudClient::new(url);
        let err = client
            .send_message(&creds("bad"), "5511999999999", &OutgoingMessage::text("Oi"))
            .await
            .unwrap_err();
        match err {
            DomainError::Gateway(msg) => assert!(msg.contains("Invalid OAuth access token")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn resolves_media_url() {
        let (url, _) = graph_stub().await;
        let client = WhatsAppCloudClient::new(url);
        let media = client.media_url(&creds("good-token"), "img-1").await.unwrap();
        assert_eq!(media, "https://cdn.example/img-1");
    }

    #[test]
    fn interactive_bodies() {
        let buttons = message_body(
            "55",
            &OutgoingMessage::Buttons {
                body: "Confirma?".into(),
                buttons: vec![ReplyButton {
                    id: "yes".into(),
                    title: "Sim".into(),
                }],
                header: None,
                footer: Some("Hotel".into()),
            },
        );
        assert_eq!(buttons["interactive"]["type"], "button");
        assert_eq!(buttons["interactive"]["action"]["buttons"][0]["reply"]["id"], "yes");
        assert_eq!(buttons["interactive"]["footer"]["text"], "Hotel");
        assert!(buttons["interactive"].get("header").is_none());

        let list = message_body(
            "55",
            &OutgoingMessage::List {
                body: "Escolha".into(),
                button: "Quartos".into(),
                sections: vec![ListSection {
                    title: None,
                    rows: vec![ListRow {
                        id: "r1".into(),
                        title: "Standard".into(),
                        description: None,
                    }],
                }],
                header: Some("Reservas".into()),
                footer: None,
            },
        );
        assert_eq!(list["interactive"]["action"]["button"], "Quartos");
        assert_eq!(list["interactive"]["action"]["sections"][0]["rows"][0]["id"], "r1");
        assert_eq!(list["interactive"]["header"]["text"], "Reservas");

        let doc = message_body(
            "55",
            &OutgoingMessage::Media {
                kind: MediaKind::Document,
                url: "https://x/v.pdf".into(),
                caption: Some("Voucher".into()),
                filename: Some("v.pdf".into()),
            },
        );
        assert_eq!(doc["type"], "document");
        assert_eq!(doc["document"]["filename"], "v.pdf");
    }
}
