//! Marketplace adapters: Beru (Yandex Market FBS), Ozon FBS,
//! Wildberries Marketplace v3 and SberMegaMarket.
//!
//! Each module owns the vendor's wire types, an HTTP client, and the
//! mapping between the vendor's status vocabulary and
//! [`sewmart_core::OrderStatus`]. Outbound calls share one retry policy
//! (exponential backoff with jitter on transient failures).

pub mod beru;
pub mod error;
pub mod ozon;
pub mod sber;
pub mod wb;

mod http;
mod retry;

pub use error::ChannelError;

/// Connection settings shared by every channel client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme + host of the vendor API; tests point this at a mock server.
    pub api_base: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Additional attempts after the first failure; 0 disables retries.
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub backoff_base_ms: u64,
}

impl ClientConfig {
    /// Settings for one channel out of the application config.
    #[must_use]
    pub fn from_app_config(config: &sewmart_core::AppConfig, api_base: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout_secs: config.http_timeout_secs,
            user_agent: config.http_user_agent.clone(),
            max_retries: config.http_max_retries,
            backoff_base_ms: config.http_retry_backoff_base_secs.saturating_mul(1000),
        }
    }

    pub(crate) fn build_http(&self) -> Result<reqwest::Client, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .user_agent(self.user_agent.clone())
            .build()?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_strips_trailing_slash() {
        let map = std::collections::HashMap::from([("DATABASE_URL", "postgres://example")]);
        let app = sewmart_core::config::build_app_config(move |key| {
            map.get(key)
                .map(ToString::to_string)
                .ok_or(std::env::VarError::NotPresent)
        })
        .expect("config builds");

        let config = ClientConfig::from_app_config(&app, "https://api.example.com/");
        assert_eq!(config.api_base, "https://api.example.com");
        assert_eq!(config.backoff_base_ms, 5000);
    }
}
