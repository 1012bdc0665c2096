use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// How long before expiry a token is already considered stale.
pub const REFRESH_MARGIN_MS: u64 = 10_000;

/// The OAuth credential triple held for the bot's single identity.
///
/// The [TokenManager](super::access::TokenManager) is the sole writer; a
/// [TokenStore](super::store::TokenStore) only mirrors it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at_epoch_ms: u64,
}

/// An authorization code caught by the [OAuth server](super::oauth).
#[derive(Debug, Clone)]
pub struct AuthCode(pub(super) String);

impl Credential {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Returns the access token if it is still more than
    /// [REFRESH_MARGIN_MS] away from expiring.
    #[must_use]
    pub fn fresh_access_token(&self) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        (self.expires_at_epoch_ms > epoch_ms_now() + REFRESH_MARGIN_MS).then_some(token)
    }
}

impl AuthCode {
    #[must_use]
    pub fn new<S: Into<String>>(code: S) -> Self {
        AuthCode(code.into())
    }
}

pub(crate) fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
