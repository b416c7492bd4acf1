use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::AuthMethod;
use crate::config::RepoLocation;
use crate::error::{RemoteError, RemoteResult};
use crate::route::Route;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// The ledger file as read from the host.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FileContents {
    /// Base64 file content, possibly line-wrapped.
    pub content: String,
    pub sha: String,
}

/// Body of a contents write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileWrite {
    pub message: String,
    pub content: String,
    /// Precondition token: the hash of the revision being replaced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Hash the host assigned to a written revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenFile {
    pub sha: String,
}

#[derive(Deserialize)]
struct WriteResponse {
    content: WrittenContent,
}

#[derive(Deserialize)]
struct WrittenContent {
    sha: String,
}

/// The account a credential belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Typed access to one contents resource over a [`Transport`].
#[derive(Clone)]
pub struct ContentsClient {
    transport: Arc<dyn Transport>,
    location: RepoLocation,
}

impl ContentsClient {
    pub fn new(transport: Arc<dyn Transport>, location: RepoLocation) -> Self {
        Self {
            transport,
            location,
        }
    }

    pub fn location(&self) -> &RepoLocation {
        &self.location
    }

    pub async fn read(&self, auth: &AuthMethod) -> RemoteResult<FileContents> {
        let response = self.send(Route::READ_CONTENTS, auth, None).await?;
        if !response.is_success() {
            return Err(RemoteError::ReadFailed {
                status: response.status,
                message: response.error_message(),
            });
        }
        serde_json::from_value(response.data)
            .map_err(|e| RemoteError::UnexpectedResponse(format!("contents read: {e}")))
    }

    pub async fn write(&self, auth: &AuthMethod, file: &FileWrite) -> RemoteResult<WrittenFile> {
        let body = serde_json::to_value(file)
            .map_err(|e| RemoteError::Internal(format!("encode write body: {e}")))?;
        let response = self.send(Route::WRITE_CONTENTS, auth, Some(body)).await?;
        if !response.is_success() {
            return Err(RemoteError::WriteFailed {
                status: response.status,
                message: response.error_message(),
            });
        }
        let parsed: WriteResponse = serde_json::from_value(response.data)
            .map_err(|e| RemoteError::UnexpectedResponse(format!("contents write: {e}")))?;
        Ok(WrittenFile {
            sha: parsed.content.sha,
        })
    }

    pub async fn current_user(&self, auth: &AuthMethod) -> RemoteResult<User> {
        let response = self.send(Route::CURRENT_USER, auth, None).await?;
        if !response.is_success() {
            return Err(RemoteError::ReadFailed {
                status: response.status,
                message: response.error_message(),
            });
        }
        serde_json::from_value(response.data)
            .map_err(|e| RemoteError::UnexpectedResponse(format!("user lookup: {e}")))
    }

    async fn send(
        &self,
        route: Route,
        auth: &AuthMethod,
        body: Option<serde_json::Value>,
    ) -> RemoteResult<ApiResponse> {
        let request = ApiRequest {
            method: route.method,
            path: route.render(&self.location),
            auth: auth.clone(),
            body,
        };
        tracing::debug!(method = %request.method, path = %request.path, "remote request");
        let response = self.transport.request(request).await?;
        tracing::debug!(status = response.status, "remote response");
        Ok(response)
    }
}
