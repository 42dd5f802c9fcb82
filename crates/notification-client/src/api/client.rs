use std::sync::OnceLock;
use std::time::Instant;

use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{NotifyError, Result};
use crate::model::ApiEnvelope;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate in the process got there first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Body shape of an error response. Only the message is of interest.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Thin JSON client over one `reqwest::Client`.
///
/// Every REST call is bounded by [`ClientConfig::timeout`]; requests built
/// with [`ApiClient::stream_request`] are not, since the live channel stays
/// open indefinitely.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        install_rustls_provider();

        let base_url = normalize_base_url(&config.base_url)?;
        let headers = default_headers(&config)?;

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve an endpoint path (without leading slash) against the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Build a REST request with the per-request timeout applied.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        Ok(self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .timeout(self.config.timeout))
    }

    /// Build a long-lived streaming request. No total timeout is applied.
    pub fn stream_request(&self, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        Ok(self.http.get(url))
    }

    /// Send a request and unwrap the `{success, message, data}` envelope.
    pub async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.execute(request).await?;
        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;
        envelope.into_data()
    }

    /// Send a request whose envelope carries no meaningful payload.
    pub async fn send_unit(&self, request: RequestBuilder) -> Result<()> {
        let body = self.execute(request).await?;
        let envelope: ApiEnvelope<IgnoredAny> = serde_json::from_str(&body)?;
        envelope.into_result().map(|_| ())
    }

    async fn execute(&self, request: RequestBuilder) -> Result<String> {
        let (client, request) = request.build_split();
        let request = request?;
        let method = request.method().clone();
        let url = request.url().clone();

        debug!(%method, %url, "sending request");
        let started = Instant::now();
        let response = client.execute(request).await.inspect_err(|e| {
            warn!(%method, %url, error = %e, "request failed");
        })?;

        let status = response.status();
        debug!(
            %method,
            %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "received response"
        );

        read_body(response).await
    }
}

async fn read_body(response: Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message);
        return Err(NotifyError::from_status(status, message));
    }

    Ok(body)
}

fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(NotifyError::config(format!("base URL cannot be a base: {raw}")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if let Some(cookie) = &config.cookie {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| NotifyError::config(format!("invalid cookie header: {e}")))?;
        headers.insert(COOKIE, value);
    }

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| NotifyError::config(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| NotifyError::config(format!("invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}
