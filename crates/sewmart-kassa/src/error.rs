use thiserror::Error;

/// Errors returned by the payment gateway client.
#[derive(Debug, Error)]
pub enum KassaError {
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

    /// HTTP 401 — wrong shop id or secret key.
    #[error("payment gateway rejected shop credentials")]
    Unauthorized,

    /// The gateway answered with a structured error object.
    #[error("payment gateway error {code}: {description}")]
    Api { code: String, description: String },

    /// Any other non-2xx status without a structured error body.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// A webhook notification referenced a payment the gateway no
    /// longer knows.
    #[error("payment {0} not found")]
    PaymentNotFound(String),
}
