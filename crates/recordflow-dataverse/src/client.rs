use reqwest::header::HeaderMap;
use tracing::debug;

use crate::models::ChangesPage;

#[derive(Debug, thiserror::Error)]
pub enum DataverseError {
    /// The request never produced a usable response (DNS, connect,
    /// timeout, TLS).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body was not a change page.
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// HTTP client for a Dataverse-style change-tracking endpoint.
pub struct DataverseClient {
    base_url: String,
    default_headers: HeaderMap,
    client: reqwest::Client,
}

impl DataverseClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            format!("Bearer {}", api_key)
                .parse()
                .expect("Invalid API key format"),
        );

        // 30 second timeout; change pages can be large on first sync.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_headers: headers,
            client,
        }
    }

    /// Classify a reqwest error into something an operator can act on.
    fn format_reqwest_error(e: reqwest::Error, url: &str, operation: &str) -> String {
        if e.is_timeout() {
            format!(
                "Failed to {} for {}: timeout - request took too long (check network or increase timeout)",
                operation, url
            )
        } else if e.is_connect() {
            format!(
                "Failed to {} for {}: connection error - check network connectivity and DNS. Error: {}",
                operation, url, e
            )
        } else if e.is_request() {
            format!(
                "Failed to {} for {}: request error - invalid URL or malformed parameters. Error: {}",
                operation, url, e
            )
        } else {
            format!("Failed to {} for {}: {}", operation, url, e)
        }
    }

    /// Fetch the page of entity changes after `token`.
    ///
    /// `None` requests a full initial sync; the server then streams every
    /// live entity as a new-or-updated change before incremental ones.
    pub async fn entity_changes(
        &self,
        entity_type: &str,
        token: Option<&str>,
    ) -> Result<ChangesPage, DataverseError> {
        let mut url = format!("{}/changes/{}", self.base_url, entity_type);
        if let Some(token) = token {
            url.push_str("?token=");
            url.push_str(&urlencode(token));
        }

        debug!(entity_type, url = %url, "fetching entity changes");

        let response = self
            .client
            .get(&url)
            .headers(self.default_headers.clone())
            .send()
            .await
            .map_err(|e| DataverseError::Transport {
                url: url.clone(),
                message: Self::format_reqwest_error(e, &url, "fetch entity changes"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataverseError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ChangesPage>()
            .await
            .map_err(|e| DataverseError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })
    }
}

/// Percent-encode the characters a resume token can carry that are not
/// query-safe. Tokens are server-issued and short; a full URL codec is
/// not warranted.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
