pub mod client;

pub use client::N8nWebhookClient;
