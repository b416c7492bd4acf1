use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};

use crate::error::RemoteResult;
use crate::route::Method;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// In-memory emulation of the hosting API's contents endpoints.
///
/// Serves `GET`/`PUT /repos/{owner}/{repo}/contents/{path}` and `GET /user`
/// with the same status codes the host uses: 401 for anonymous calls, 404
/// for missing files, 409 when a write's `sha` does not match the current
/// revision. Content hashes are BLAKE3 over the unwrapped base64 content.
///
/// Fault hooks let tests force a status on the next call of a verb, or land
/// a foreign write right after the next successful write so the
/// confirmation read observes a different revision.
pub struct InMemoryHost {
    login: String,
    inner: Mutex<HostState>,
}

#[derive(Default)]
struct HostState {
    files: HashMap<String, StoredFile>,
    commit_messages: Vec<String>,
    requests: Vec<(Method, String)>,
    forced_status: HashMap<Method, VecDeque<u16>>,
    foreign_write: Option<String>,
}

#[derive(Clone)]
struct StoredFile {
    content: String,
    sha: String,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self {
            login: "ledger-bot".into(),
            inner: Mutex::new(HostState::default()),
        }
    }

    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = login.into();
        self
    }

    /// Place a file directly, bypassing preconditions. Returns its sha.
    pub fn seed_file(&self, owner: &str, repo: &str, path: &str, content: &str) -> String {
        let file = StoredFile::new(content);
        let sha = file.sha.clone();
        self.state().files.insert(file_key(owner, repo, path), file);
        sha
    }

    /// Current unwrapped content of a file.
    pub fn file_content(&self, owner: &str, repo: &str, path: &str) -> Option<String> {
        self.state()
            .files
            .get(&file_key(owner, repo, path))
            .map(|f| f.content.clone())
    }

    pub fn file_sha(&self, owner: &str, repo: &str, path: &str) -> Option<String> {
        self.state()
            .files
            .get(&file_key(owner, repo, path))
            .map(|f| f.sha.clone())
    }

    /// Answer the next `method` call with `status` instead of serving it.
    pub fn fail_next(&self, method: Method, status: u16) {
        self.state()
            .forced_status
            .entry(method)
            .or_default()
            .push_back(status);
    }

    /// After the next successful write, replace the file with `content` as
    /// if another client had written it.
    pub fn overwrite_after_next_write(&self, content: impl Into<String>) {
        self.state().foreign_write = Some(content.into());
    }

    pub fn request_count(&self, method: Method) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|(m, _)| *m == method)
            .count()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.state().commit_messages.clone()
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn serve(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.state();
        state.requests.push((request.method, request.path.clone()));

        if let Some(status) = state
            .forced_status
            .get_mut(&request.method)
            .and_then(VecDeque::pop_front)
        {
            return error_response(status, "injected failure");
        }

        if !request.auth.is_authenticated() {
            return error_response(401, "Requires authentication");
        }

        if request.method == Method::Get && request.path == "/user" {
            return ApiResponse::new(200, json!({ "login": self.login }));
        }

        let Some(key) = parse_contents_path(&request.path) else {
            return error_response(404, "Not Found");
        };

        match request.method {
            Method::Get => match state.files.get(&key) {
                Some(file) => ApiResponse::new(
                    200,
                    json!({
                        "type": "file",
                        "encoding": "base64",
                        "path": key,
                        "content": wrap(&file.content),
                        "sha": file.sha,
                    }),
                ),
                None => error_response(404, "Not Found"),
            },
            Method::Put => Self::put(&mut state, key, request.body.as_ref()),
        }
    }

    fn put(state: &mut HostState, key: String, body: Option<&Value>) -> ApiResponse {
        let Some(body) = body else {
            return error_response(422, "Invalid request: body required");
        };
        let (Some(message), Some(content)) = (
            body.get("message").and_then(Value::as_str),
            body.get("content").and_then(Value::as_str),
        ) else {
            return error_response(422, "Invalid request: message and content required");
        };
        let precondition = body.get("sha").and_then(Value::as_str);

        let created = match (state.files.get(&key), precondition) {
            (Some(current), Some(sha)) if current.sha == sha => false,
            (Some(_), Some(_)) => {
                return error_response(409, &format!("{key} does not match the given sha"))
            }
            (Some(_), None) => {
                return error_response(422, "Invalid request: \"sha\" wasn't supplied")
            }
            (None, Some(_)) => return error_response(409, &format!("{key} does not exist")),
            (None, None) => true,
        };

        let file = StoredFile::new(content);
        let sha = file.sha.clone();
        state.files.insert(key.clone(), file);
        state.commit_messages.push(message.to_string());

        if let Some(foreign) = state.foreign_write.take() {
            state.files.insert(key.clone(), StoredFile::new(&foreign));
            state.commit_messages.push("foreign write".into());
        }

        ApiResponse::new(
            if created { 201 } else { 200 },
            json!({
                "content": { "path": key, "sha": sha },
                "commit": { "message": message },
            }),
        )
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryHost {
    async fn request(&self, request: ApiRequest) -> RemoteResult<ApiResponse> {
        Ok(self.serve(&request))
    }
}

impl StoredFile {
    fn new(content: &str) -> Self {
        let content: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let sha = hex::encode(blake3::hash(content.as_bytes()).as_bytes());
        Self { content, sha }
    }
}

fn file_key(owner: &str, repo: &str, path: &str) -> String {
    format!("{owner}/{repo}/{}", path.trim_start_matches('/'))
}

fn parse_contents_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/repos/")?;
    let mut parts = rest.splitn(4, '/');
    let owner = decode(parts.next()?);
    let repo = decode(parts.next()?);
    if parts.next()? != "contents" {
        return None;
    }
    let file = parts.next().filter(|p| !p.is_empty())?;
    Some(file_key(&owner, &repo, &decode(file)))
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

fn wrap(content: &str) -> String {
    let mut wrapped = String::with_capacity(content.len() + content.len() / 60 + 1);
    for (i, c) in content.chars().enumerate() {
        if i > 0 && i % 60 == 0 {
            wrapped.push('\n');
        }
        wrapped.push(c);
    }
    wrapped.push('\n');
    wrapped
}

fn error_response(status: u16, message: &str) -> ApiResponse {
    ApiResponse::new(status, json!({ "message": message }))
}
