//! Core domain layer. No external I/O dependencies.
//!
//! Entities, input validation and business rules live here. Dependencies flow inward.

pub mod actions;
pub mod entities;
pub mod errors;
pub mod inbound;
pub mod inputs;
pub mod n8n;
pub mod outgoing;
pub mod views;

pub use entities::*;
pub use errors::DomainError;
pub use inbound::{
    InboundBatch, InboundContent, InboundMessage, MediaRef, MessageRecord, StatusReceipt,
};
pub use n8n::{build_payload, resolve_webhook_url, ForwardOutcome, N8nPayload};
pub use outgoing::{ListRow, ListSection, MediaKind, OutgoingMessage, ReplyButton};
pub use views::*;
