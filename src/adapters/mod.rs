//! Infrastructure adapters. Implement outbound ports and expose the HTTP surface.
//!
//! libsql, WhatsApp Cloud API, N8N webhooks, Meta webhooks. Map errors to DomainError.

pub mod events;
pub mod export;
pub mod http;
pub mod meta;
pub mod n8n;
pub mod persistence;
pub mod whatsapp;
