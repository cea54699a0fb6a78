//! reqwest-backed HTTP adapter

use super::{HttpAdapter, HttpError, HttpRequest, RawResponse};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Transport settings fixed at construction
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("toolchat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Production adapter
pub struct ReqwestAdapter {
    client: reqwest::Client,
}

impl ReqwestAdapter {
    pub fn new(settings: &HttpSettings) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    /// Build reqwest request from adapter request (pure function)
    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.get(&request.url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder
    }

    /// Describe a reqwest failure without the request URL, which may hold API keys
    fn describe_transport_error(error: reqwest::Error) -> String {
        let kind = if error.is_timeout() {
            "timed out"
        } else if error.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        format!("{kind}: {}", error.without_url())
    }
}

#[async_trait::async_trait]
impl HttpAdapter for ReqwestAdapter {
    async fn call(&self, request: HttpRequest) -> Result<RawResponse, HttpError> {
        debug!(
            url = %request.url,
            params = request.query.len(),
            "Outbound HTTP request"
        );

        let response = self
            .build_request(&request)
            .send()
            .await
            .map_err(|e| {
                let message = Self::describe_transport_error(e);
                warn!(url = %request.url, "HTTP transport error: {}", message);
                HttpError::Transport(message)
            })?;

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| HttpError::Decode(e.without_url().to_string()))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), url = %request.url, "Remote error status");
            return Err(HttpError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        Ok(RawResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}
