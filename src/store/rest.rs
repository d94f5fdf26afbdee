//! REST adapter for the marketplace API
//!
//! Maps store calls onto `{base_url}/{collection}[/{id}]`:
//!
//! | Call | Method |
//! |------|--------|
//! | fetch_one | GET |
//! | fetch_list | GET with `page`, `limit` and filter pairs |
//! | create | POST |
//! | update | PATCH |
//! | delete | DELETE |
//!
//! Error bodies are loosely typed JSON carrying an optional `error` string.

use super::{ListQuery, RemoteError, RemoteResult, RemoteStore};
use crate::error::{ElyxError, ElyxResult};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Error body shape used by the API routes
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Remote store backed by the HTTP API
pub struct RestStore {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl RestStore {
    /// Create a REST store rooted at `base_url`
    pub fn new(base_url: &str, api_token: Option<String>) -> ElyxResult<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ElyxError::User(format!("Invalid store.base_url {}: {}", base_url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(ElyxError::User(format!(
                "Invalid store.base_url {}: not a hierarchical URL",
                base_url
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("elyx/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    fn url(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::transport("store URL cannot take path segments"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> RemoteResult<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::new(status.as_u16(), format!("reading body: {}", e)))?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body).map_err(|e| {
                RemoteError::new(status.as_u16(), format!("Failed to parse response: {}", e))
            });
        }

        Err(RemoteError::new(status.as_u16(), error_message(&body, status)))
    }
}

fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(message),
            ..
        })
        | Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn fetch_one(&self, collection: &str, id: &str) -> RemoteResult<Value> {
        let url = self.url(&[collection, id])?;
        debug!("GET {}", url);
        self.send(self.request(Method::GET, url)).await
    }

    async fn fetch_list(&self, collection: &str, query: &ListQuery) -> RemoteResult<Value> {
        let mut url = self.url(&[collection])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &query.page.to_string());
            pairs.append_pair("limit", &query.limit.to_string());
            for (field, value) in &query.filter {
                pairs.append_pair(field, value);
            }
        }
        debug!("GET {}", url);
        self.send(self.request(Method::GET, url)).await
    }

    async fn create(&self, collection: &str, value: Value) -> RemoteResult<Value> {
        let url = self.url(&[collection])?;
        debug!("POST {}", url);
        self.send(self.request(Method::POST, url).json(&value))
            .await
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> RemoteResult<Value> {
        let url = self.url(&[collection, id])?;
        debug!("PATCH {}", url);
        self.send(self.request(Method::PATCH, url).json(&patch))
            .await
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<Value> {
        let url = self.url(&[collection, id])?;
        debug!("DELETE {}", url);
        self.send(self.request(Method::DELETE, url)).await
    }

    fn store_name(&self) -> &'static str {
        "rest"
    }
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
