use async_trait::async_trait;
use serde_json::Value;

use crate::auth::AuthMethod;
use crate::error::RemoteResult;
use crate::route::Method;

/// A single call against the hosting API.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Rendered path, e.g. `/repos/acme/qa/contents/ledger.json`.
    pub path: String,
    pub auth: AuthMethod,
    pub body: Option<Value>,
}

/// Raw status and JSON body of a response.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

impl ApiResponse {
    pub fn new(status: u16, data: Value) -> Self {
        Self { status, data }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best-effort error text from the body.
    pub fn error_message(&self) -> String {
        self.data
            .get("message")
            .or_else(|| self.data.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }
}

/// Authenticated request function of the hosting API.
///
/// A non-success status is an `Ok` response; only failures to complete the
/// exchange are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> RemoteResult<ApiResponse>;
}
