//! WhatsApp Cloud API: webhook intake (wire types, signature, classifier) and
//! the outbound Graph API client.

pub mod client;
pub mod mapper;
pub mod signature;
pub mod webhook;

pub use client::WhatsAppCloudClient;
