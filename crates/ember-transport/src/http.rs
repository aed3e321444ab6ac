//! HTTP control-plane client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde_json::Value;
use tracing::{debug, trace};

use ember_core::{ControlPlane, ControlPlaneError, ControlPlaneResult, check_response};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the token is presented in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Authorization: Bot <token>`
    Bot,
    /// `Authorization: Bearer <token>`
    #[default]
    Bearer,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Bot => f.write_str("Bot"),
            AuthScheme::Bearer => f.write_str("Bearer"),
        }
    }
}

/// JSON API client rooted at a base URL.
#[derive(Clone)]
pub struct HttpControlPlane {
    client: Client,
    base_url: String,
    auth: Option<(AuthScheme, String)>,
}

impl HttpControlPlane {
    /// Creates a client with a 30 second request timeout.
    pub fn new(base_url: impl Into<String>) -> ControlPlaneResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ControlPlaneResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| ControlPlaneError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth: None,
        })
    }

    /// Sends `token` with every request.
    pub fn with_token(mut self, scheme: AuthScheme, token: impl Into<String>) -> Self {
        self.auth = Some((scheme, token.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((scheme, token)) => req.header("Authorization", format!("{scheme} {token}")),
            None => req,
        }
    }

    async fn execute(&self, req: RequestBuilder) -> ControlPlaneResult<Value> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| ControlPlaneError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Http(format!(
                "HTTP {} error: {}",
                status.as_u16(),
                text
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ControlPlaneError::Decode(e.to_string()))?;
        trace!(body = %body, "Control plane response");
        check_response(body)
    }
}

impl fmt::Debug for HttpControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpControlPlane")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.as_ref().map(|(scheme, _)| scheme))
            .finish()
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> ControlPlaneResult<Value> {
        debug!(path = %path, "GET");
        self.execute(self.client.get(self.url(path)).query(query))
            .await
    }

    async fn post(&self, path: &str, body: Value) -> ControlPlaneResult<Value> {
        debug!(path = %path, "POST");
        self.execute(self.client.post(self.url(path)).json(&body))
            .await
    }
}
