//! OAuth token lifecycle: the bootstrap authorization flow, the token
//! manager that refreshes before expiry, and the durable credential mirrors.
use std::time::Duration;

pub mod access;
pub mod creds;
pub mod error;
pub mod oauth;
pub mod store;

pub use creds::{AuthCode, Credential};

/// The data to build a [TokenManager](access::TokenManager).
#[derive(Debug, Clone)]
pub struct TokenManagerData {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_url: String,
    pub request_timeout: Duration,
}

/// The data to host a local [OAuthServer](oauth::OAuthServer).
#[derive(Debug)]
pub struct OAuthServerData {
    pub client_id: String,
    pub authorize_url: String,
    pub scopes: Vec<String>,
    pub host_address: String,
    pub response_path: String,
}
