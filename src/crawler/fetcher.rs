//! JSON-over-HTTP client shared by the provider implementations
//!
//! [`ApiFetcher`] owns the `reqwest` client, the provider base URL and any
//! credential header. It maps every failure onto [`FetchError`] and never
//! retries: a failed request is reported once and the crawler moves on.

use crate::utils::error::FetchError;
use crate::utils::truncate_text;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT},
    Client, RequestBuilder, Response, StatusCode,
};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one provider base URL
#[derive(Debug, Clone)]
pub struct ApiFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Provider base URL, without trailing slash
    base_url: String,

    /// Headers sent with every request (credentials, user agent)
    headers: HeaderMap,
}

impl ApiFetcher {
    /// Create a fetcher for `base_url`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` for an unparsable base URL and
    /// `FetchError::Http` if the HTTP client cannot be created
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        Url::parse(base_url).map_err(|e| FetchError::InvalidUrl(format!("{base_url}: {e}")))?;

        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("revharvest/", env!("CARGO_PKG_VERSION"))),
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    /// Add a header sent with every request
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidHeader` if the name or value is not a legal header
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, FetchError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::InvalidHeader(format!("{name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Override the user agent
    pub fn with_user_agent(self, user_agent: &str) -> Result<Self, FetchError> {
        self.with_header(USER_AGENT.as_str(), user_agent)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `path` against the base URL
    ///
    /// The base path is kept, so `https://host/v1` + `scroll/x` is `https://host/v1/scroll/x`.
    pub fn url_for(&self, path: &str) -> Result<Url, FetchError> {
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| FetchError::InvalidUrl(format!("{joined}: {e}")))
    }

    /// GET `path` with query parameters and decode the JSON body
    pub async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = self.url_for(path)?;
        tracing::debug!(url = %url, "GET");
        let request = self.client.get(url).headers(self.headers.clone()).query(query);
        self.send(request).await
    }

    /// POST a JSON body to `path` and decode the JSON response
    pub async fn post_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value, FetchError> {
        let url = self.url_for(path)?;
        tracing::debug!(url = %url, "POST");
        let request = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .query(query)
            .json(body);
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, FetchError> {
        match request.send().await {
            Ok(response) => Self::decode_response(response).await,
            Err(e) if e.is_timeout() => Err(FetchError::Timeout),
            Err(e) => Err(FetchError::Http(e)),
        }
    }

    /// Check status and content type, then parse the body as JSON
    ///
    /// A bare JSON string is how providers report errors in-band.
    async fn decode_response(response: Response) -> Result<Value, FetchError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_lowercase);

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        // providers answer data with 200 only; 202/204 carry no usable page
        if status != StatusCode::OK {
            return Err(FetchError::status(status.as_u16(), &body));
        }

        if let Some(ct) = content_type.as_deref() {
            if !ct.contains("json") {
                return Err(FetchError::Malformed(format!(
                    "unexpected content type {ct}: {}",
                    truncate_text(&body, 120)
                )));
            }
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::Malformed(format!("invalid JSON: {e}")))?;

        match value {
            Value::String(message) => Err(FetchError::ProviderReported(message)),
            other => Ok(other),
        }
    }
}
