use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::route::Method;
use crate::transport::{ApiRequest, ApiResponse, Transport};

const GITHUB_JSON: &str = "application/vnd.github+json";

/// [`Transport`] over HTTPS against a GitHub-compatible REST API.
pub struct HttpTransport {
    client: reqwest::Client,
    api_base: String,
}

impl HttpTransport {
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_JSON));
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| RemoteError::Config(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| RemoteError::Config(format!("cannot build http client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> RemoteResult<ApiResponse> {
        let url = self.url_for(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Put => self.client.put(&url),
        };
        if let Some(value) = request.auth.header_value() {
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("{} {url}: {e}", request.method)))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(format!("read body of {url}: {e}")))?;
        let data = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Ok(ApiResponse::new(status, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_config() {
        let transport = HttpTransport::new(&RemoteConfig::default()).unwrap();
        assert_eq!(
            transport.url_for("/repos/acme/qa/contents/ledger.json"),
            "https://api.github.com/repos/acme/qa/contents/ledger.json"
        );
    }

    #[test]
    fn trailing_slash_in_base_is_ignored() {
        let config = RemoteConfig {
            api_base: "https://ghe.example.com/api/v3/".into(),
            ..Default::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.url_for("/user"), "https://ghe.example.com/api/v3/user");
    }

    #[test]
    fn invalid_user_agent_is_config_error() {
        let config = RemoteConfig {
            user_agent: "bad\nagent".into(),
            ..Default::default()
        };
        assert!(matches!(HttpTransport::new(&config), Err(RemoteError::Config(_))));
    }
}
