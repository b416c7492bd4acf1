//! Remote access for the Version Ledger.
//!
//! The ledger lives as one file in a hosted repository. This crate provides
//! the seams the store talks through:
//! - [`Session`]: connection state and the bearer credential cookie
//! - [`Transport`]: an authenticated `request(route, body) -> {status, data}`
//! - [`ContentsClient`]: typed read/write of the ledger file over a transport
//! - [`HttpTransport`]: a `reqwest` transport for a GitHub-compatible API
//! - [`InMemoryHost`]: a contents API emulator for tests and demos

pub mod auth;
pub mod config;
pub mod contents;
pub mod error;
pub mod http;
pub mod memory;
pub mod route;
pub mod session;
pub mod transport;

pub use auth::AuthMethod;
pub use config::{RemoteConfig, RepoLocation, DEFAULT_LEDGER_PATH};
pub use contents::{ContentsClient, FileContents, FileWrite, User, WrittenFile};
pub use error::{RemoteError, RemoteResult};
pub use http::HttpTransport;
pub use memory::InMemoryHost;
pub use route::{Method, Route};
pub use session::{Session, StaticSession, ACCESS_TOKEN_COOKIE};
pub use transport::{ApiRequest, ApiResponse, Transport};
