//! hotel-crm: multi-tenant hotel CRM backend with Hexagonal Architecture.
//!
//! WhatsApp, Messenger and Instagram inboxes feed a Kanban of conversations;
//! inbound messages are forwarded to each tenant's N8N workflows.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
