use thiserror::Error;

/// Errors returned by the marketplace clients.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP 429 from the vendor.
    #[error("rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// HTTP 401/403 — bad or expired credentials; retrying won't fix it.
    #[error("unauthorized by vendor API: {url}")]
    Unauthorized { url: String },

    /// Any other non-2xx status.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The vendor answered 200 but reported an application-level error.
    #[error("vendor API error: {0}")]
    Api(String),

    /// The channel is not configured (missing token/credentials).
    #[error("missing credentials for channel {0}")]
    MissingCredentials(&'static str),

    /// The vendor sent a status outside its published vocabulary.
    #[error("unknown {channel} status: {status}")]
    UnknownVendorStatus {
        channel: &'static str,
        status: String,
    },

    /// The internal status has no representation on this channel.
    #[error("status {status} cannot be pushed to {channel}")]
    Unpushable {
        channel: &'static str,
        status: sewmart_core::OrderStatus,
    },
}
