use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Credentials and endpoint for one marketplace channel. Base URLs are
/// configurable so tests can point clients at a local mock server.
#[derive(Clone, Default)]
pub struct ChannelCredentials {
    pub api_base: String,
    pub token: Option<String>,
    pub client_id: Option<String>,
    pub campaign_id: Option<String>,
}

impl ChannelCredentials {
    /// Whether enough credentials are present to make outbound calls.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub http_user_agent: String,
    pub http_max_retries: u32,
    pub http_retry_backoff_base_secs: u64,
    pub beru: ChannelCredentials,
    pub ozon: ChannelCredentials,
    pub wb: ChannelCredentials,
    pub sber: ChannelCredentials,
    /// Basic-auth credentials Sber presents on inbound webhooks.
    pub sber_webhook_user: Option<String>,
    pub sber_webhook_password: Option<String>,
    pub kassa_api_base: String,
    pub kassa_shop_id: Option<String>,
    pub kassa_secret_key: Option<String>,
    pub kassa_return_url: String,
    pub delivery_api_base: String,
    pub delivery_token: Option<String>,
    pub delivery_source_station: Option<String>,
}

impl std::fmt::Debug for ChannelCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCredentials")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("client_id", &self.client_id)
            .field("campaign_id", &self.campaign_id)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_user_agent", &self.http_user_agent)
            .field("http_max_retries", &self.http_max_retries)
            .field(
                "http_retry_backoff_base_secs",
                &self.http_retry_backoff_base_secs,
            )
            .field("beru", &self.beru)
            .field("ozon", &self.ozon)
            .field("wb", &self.wb)
            .field("sber", &self.sber)
            .field("sber_webhook_user", &self.sber_webhook_user)
            .field(
                "sber_webhook_password",
                &self.sber_webhook_password.as_ref().map(|_| "[redacted]"),
            )
            .field("kassa_api_base", &self.kassa_api_base)
            .field("kassa_shop_id", &self.kassa_shop_id)
            .field(
                "kassa_secret_key",
                &self.kassa_secret_key.as_ref().map(|_| "[redacted]"),
            )
            .field("kassa_return_url", &self.kassa_return_url)
            .field("delivery_api_base", &self.delivery_api_base)
            .field(
                "delivery_token",
                &self.delivery_token.as_ref().map(|_| "[redacted]"),
            )
            .field("delivery_source_station", &self.delivery_source_station)
            .finish()
    }
}
