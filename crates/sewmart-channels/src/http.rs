//! Shared response handling for the channel clients: non-2xx statuses
//! become typed errors, bodies are read as text first so a parse failure
//! can name the call that produced it.

use serde::de::DeserializeOwned;

use crate::error::ChannelError;

/// Turns a vendor response into `T`, mapping 429/401/403/other non-2xx
/// statuses to typed errors before attempting deserialization.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T, ChannelError> {
    let url = response.url().to_string();
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(ChannelError::RateLimited { retry_after_secs });
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ChannelError::Unauthorized { url });
    }

    if !status.is_success() {
        return Err(ChannelError::UnexpectedStatus {
            status: status.as_u16(),
            url,
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|source| ChannelError::Deserialize {
        context: context.to_string(),
        source,
    })
}

/// Like [`read_json`] but for endpoints that answer with an empty body
/// (WB stock updates answer 204).
pub(crate) async fn expect_success(response: reqwest::Response) -> Result<(), ChannelError> {
    let url = response.url().to_string();
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(ChannelError::RateLimited { retry_after_secs });
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ChannelError::Unauthorized { url });
    }

    if !status.is_success() {
        return Err(ChannelError::UnexpectedStatus {
            status: status.as_u16(),
            url,
        });
    }

    Ok(())
}
