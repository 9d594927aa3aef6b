//! Real-time event port. Services publish; the HTTP adapter streams to clients.

use serde::Serialize;

pub const MESSAGE_NEW: &str = "message:new";
pub const MESSAGE_STATUS: &str = "message:status";
pub const CONVERSATION_NEW: &str = "conversation:new";
pub const CONVERSATION_UPDATED: &str = "conversation:updated";

#[derive(Debug, Clone, Serialize)]
pub struct CrmEvent {
    pub tenant_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl CrmEvent {
    pub fn new(tenant_id: &str, event: &str, payload: impl Serialize) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            event: event.to_string(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Fire-and-forget publisher. Having no subscribers is not an error.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: CrmEvent);
}
