use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::auth::AuthMethod;
use crate::error::{RemoteError, RemoteResult};

/// Cookie holding the OAuth-issued bearer token.
pub const ACCESS_TOKEN_COOKIE: &str = "github_access_token";

/// Connection state supplied by the OAuth connector.
///
/// The store never reaches for ambient session state; a `Session` is passed
/// in at construction time.
pub trait Session: Send + Sync {
    fn is_connected(&self) -> bool;

    fn connect(&self) -> RemoteResult<()>;

    fn disconnect(&self);

    fn get_cookie(&self, name: &str) -> Option<String>;

    /// The credential for the next request.
    ///
    /// Fails with `NotAuthenticated` when the session is disconnected or
    /// holds no access token.
    fn credentials(&self) -> RemoteResult<AuthMethod> {
        if !self.is_connected() {
            return Err(RemoteError::NotAuthenticated("session is not connected".into()));
        }
        match self.get_cookie(ACCESS_TOKEN_COOKIE) {
            Some(token) if !token.is_empty() => Ok(AuthMethod::Bearer(token)),
            _ => Err(RemoteError::NotAuthenticated(format!(
                "session has no {ACCESS_TOKEN_COOKIE} cookie"
            ))),
        }
    }
}

/// Session backed by a fixed cookie jar, for CLIs and tests.
///
/// `connect` succeeds only when an access token cookie is present.
pub struct StaticSession {
    connected: AtomicBool,
    cookies: RwLock<BTreeMap<String, String>>,
}

impl StaticSession {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            cookies: RwLock::new(BTreeMap::new()),
        }
    }

    /// A connected session carrying `token` as its access token.
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set_cookie(ACCESS_TOKEN_COOKIE, token);
        session.connected.store(true, Ordering::SeqCst);
        session
    }

    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut cookies) = self.cookies.write() {
            cookies.insert(name.into(), value.into());
        }
    }
}

impl Default for StaticSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for StaticSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&self) -> RemoteResult<()> {
        if self.get_cookie(ACCESS_TOKEN_COOKIE).is_none() {
            return Err(RemoteError::NotAuthenticated(
                "no access token available to connect with".into(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookies.read().ok()?.get(name).cloned()
    }
}
