//! Application configuration. Bind address, paths, outbound API settings.

use serde::Deserialize;

/// Default capacity of the real-time event broadcast channel. Slow SSE
/// subscribers that fall further behind than this skip ahead.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Listen address. Read from HOTEL_CRM_BIND_ADDR.
    #[serde(default)]
    pub bind_addr: Option<String>,

    /// Directory holding crm.db. Read from HOTEL_CRM_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Domain used to build tenant login URLs (`https://{slug}.{base_domain}`).
    #[serde(default)]
    pub base_domain: Option<String>,

    #[serde(default)]
    pub event_buffer: Option<usize>,

    // ─────────────────────────────────────────────────────────────────────────
    // N8N forwarding
    // ─────────────────────────────────────────────────────────────────────────
    /// Timeout for each forward to a tenant's N8N webhook. Read from HOTEL_CRM_N8N_TIMEOUT_SECS.
    #[serde(default)]
    pub n8n_timeout_secs: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Meta platforms
    // ─────────────────────────────────────────────────────────────────────────
    /// Graph API base URL. Read from HOTEL_CRM_WHATSAPP_API_URL.
    #[serde(default)]
    pub whatsapp_api_url: Option<String>,

    /// Verify token for the Messenger webhook handshake.
    #[serde(default)]
    pub messenger_verify_token: Option<String>,

    /// Verify token for the Instagram webhook handshake.
    #[serde(default)]
    pub instagram_verify_token: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("HOTEL_CRM"));
        if let Ok(path) = std::env::var("HOTEL_CRM_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // Meta's docs name these without our prefix; accept both spellings.
        if cfg.messenger_verify_token.is_none() {
            cfg.messenger_verify_token = std::env::var("MESSENGER_VERIFY_TOKEN").ok();
        }
        if cfg.instagram_verify_token.is_none() {
            cfg.instagram_verify_token = std::env::var("INSTAGRAM_VERIFY_TOKEN").ok();
        }
        Ok(cfg)
    }

    pub fn bind_addr_or_default(&self) -> String {
        self.bind_addr
            .clone()
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
    }

    pub fn data_dir_or_default(&self) -> String {
        self.data_dir.clone().unwrap_or_else(|| "./data".to_string())
    }

    pub fn base_domain_or_default(&self) -> String {
        self.base_domain
            .clone()
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub fn event_buffer_or_default(&self) -> usize {
        self.event_buffer
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_EVENT_BUFFER)
    }

    /// Returns N8N forward timeout in seconds. Defaults to 10.
    pub fn n8n_timeout_secs_or_default(&self) -> u64 {
        self.n8n_timeout_secs.unwrap_or(10)
    }

    /// Returns the Graph API base URL without a trailing slash.
    pub fn whatsapp_api_url_or_default(&self) -> String {
        self.whatsapp_api_url
            .as_deref()
            .unwrap_or("https://graph.facebook.com/v21.0")
            .trim_end_matches('/')
            .to_string()
    }

    pub fn messenger_verify_token_or_default(&self) -> String {
        self.messenger_verify_token.clone().unwrap_or_default()
    }

    pub fn instagram_verify_token_or_default(&self) -> String {
        self.instagram_verify_token.clone().unwrap_or_default()
    }
}
