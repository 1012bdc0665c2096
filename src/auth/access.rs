//! Interface to handle DLive's OAuth-driven authentification.
use super::creds::{epoch_ms_now, AuthCode, Credential};
use super::error::TokenManagerError;
use super::store::TokenStore;
use super::TokenManagerData;
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The assumed token lifetime when the token endpoint omits `expires_in`.
const DEFAULT_LIFETIME_SECS: u64 = 3600;

/// Owns the bot's [Credential] and decides when a refresh is due.
///
/// Every successful exchange writes the credential through to the
/// [TokenStore] before returning, so a crash right after a refresh cannot
/// lose a rotated refresh token. Can be reused by cloning.
#[derive(Debug, Clone)]
pub struct TokenManager {
    creds: Arc<Mutex<Credential>>,
    store: Arc<dyn TokenStore>,
    client_id: Arc<String>,
    client_secret: Arc<String>,
    redirect_uri: Arc<String>,
    token_url: Arc<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointDenial {
    error: String,
}

impl TokenManager {
    /// Creates a new `TokenManager`, seeding its credential from whatever
    /// the store currently mirrors.
    ///
    /// # Errors
    /// Returns `Err(TokenManagerError...)`:
    /// * `::Store` if the store could not be read.
    /// * `::Net` if the HTTP client could not be built.
    pub async fn new(
        data: TokenManagerData,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, TokenManagerError> {
        let creds = store.load().await?.unwrap_or_default();
        let http = reqwest::Client::builder()
            .timeout(data.request_timeout)
            .build()?;

        Ok(TokenManager {
            creds: Arc::new(Mutex::new(creds)),
            store,
            client_id: Arc::new(data.client_id),
            client_secret: Arc::new(data.client_secret),
            redirect_uri: Arc::new(data.redirect_uri),
            token_url: Arc::new(data.token_url),
            http,
        })
    }

    /// Returns an access token that is valid for at least the refresh
    /// safety margin, refreshing it first if it is not.
    ///
    /// The whole check-then-refresh runs under the credential lock: two
    /// callers needing a token at the same moment serialize, and the second
    /// one observes the freshly refreshed expiry instead of re-exchanging a
    /// refresh token the endpoint has already rotated.
    ///
    /// # Errors
    /// Returns `Err(TokenManagerError...)`:
    /// * `::NoRefreshToken` if a refresh is due but no refresh token is
    ///   held. Re-run the authorization flow.
    /// * `::RefreshRejected` if DLive reports the grant invalid or expired.
    ///   The credential has been purged from memory and from the store.
    /// * `::ExchangeFailed` if DLive denied the refresh for any other
    ///   reason. The held credential is untouched.
    /// * `::Net`, `::BadData`, `::Store` as usual.
    pub async fn ensure_valid_access_token(&self) -> Result<String, TokenManagerError> {
        let mut creds = self.creds.lock().await;
        if let Some(token) = creds.fresh_access_token() {
            return Ok(String::from(token));
        }

        let refresh_token = creds
            .refresh_token
            .clone()
            .ok_or(TokenManagerError::NoRefreshToken)?;

        tracing::debug!("access token stale, refreshing");
        let (status, body) = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .await?;

        if !(200..300).contains(&status) {
            if refresh_grant_revoked(status, &body) {
                *creds = Credential::empty();
                self.store.save(&creds).await?;
                return Err(TokenManagerError::RefreshRejected);
            }
            return Err(TokenManagerError::ExchangeFailed { status, body });
        }

        let response =
            serde_json::from_str::<TokenEndpointResponse>(&body).map_err(TokenManagerError::BadData)?;
        let access_token = apply_exchange(&mut creds, response);
        self.store.save(&creds).await?;

        Ok(access_token)
    }

    /// Exchanges an authorization code for the initial credential pair and
    /// stores it.
    ///
    /// # Errors
    /// Returns `Err(TokenManagerError...)`:
    /// * `::ExchangeFailed` if DLive returned any non-success response.
    /// * `::Net`, `::BadData`, `::Store` as usual.
    pub async fn complete_authorization(
        &self,
        code: &AuthCode,
    ) -> Result<Credential, TokenManagerError> {
        let (status, body) = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code.0.as_str()),
            ])
            .await?;

        if !(200..300).contains(&status) {
            return Err(TokenManagerError::ExchangeFailed { status, body });
        }
        let response =
            serde_json::from_str::<TokenEndpointResponse>(&body).map_err(TokenManagerError::BadData)?;

        let mut creds = self.creds.lock().await;
        apply_exchange(&mut creds, response);
        self.store.save(&creds).await?;

        Ok(creds.clone())
    }

    /// Whether a refresh token is currently held. When this is `false`, the
    /// authorization flow has to run before the bot can do anything.
    pub async fn has_refresh_token(&self) -> bool {
        self.creds.lock().await.refresh_token.is_some()
    }

    async fn token_request(
        &self,
        form: &[(&str, &str)],
    ) -> Result<(u16, String), TokenManagerError> {
        let response = self
            .http
            .post(&*self.token_url)
            .header("Authorization", self.basic_client_header())
            .form(form)
            .send()
            .await
            .map_err(TokenManagerError::Net)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(TokenManagerError::Net)?;
        Ok((status, body))
    }

    // The token endpoint authenticates the *client* with a Basic header
    // built from id:secret, separate from the user grant in the form body.
    fn basic_client_header(&self) -> String {
        let pair = format!("{}:{}", self.client_id, self.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(pair)
        )
    }
}

fn apply_exchange(creds: &mut Credential, response: TokenEndpointResponse) -> String {
    creds.expires_at_epoch_ms =
        epoch_ms_now() + response.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS) * 1000;
    // DLive may rotate the refresh token on use; keep the old one only when
    // the response carries none.
    if let Some(refresh_token) = response.refresh_token {
        creds.refresh_token = Some(refresh_token);
    }
    creds.access_token = Some(response.access_token.clone());
    response.access_token
}

fn refresh_grant_revoked(status: u16, body: &str) -> bool {
    // Only an explicit invalid_grant is terminal. Anything else (a 500, a
    // garbled body) must not wipe a credential that may still work.
    (status == 400 || status == 401)
        && serde_json::from_str::<TokenEndpointDenial>(body)
            .map(|denial| denial.error == "invalid_grant")
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::super::store::MemoryTokenStore;
    use super::*;
    use std::time::Duration;

    const TOKEN_BODY: &str =
        r#"{"access_token":"new-access","refresh_token":"new-refresh","expires_in":3600}"#;

    async fn manager_with(
        server: &mockito::Server,
        creds: Credential,
    ) -> (TokenManager, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        store.save(&creds).await.unwrap();
        let manager = TokenManager::new(
            TokenManagerData {
                client_id: String::from("client-id"),
                client_secret: String::from("client-secret"),
                redirect_uri: String::from("http://localhost:3000/oauth/callback"),
                token_url: format!("{}/o/token", server.url()),
                request_timeout: Duration::from_secs(5),
            },
            store.clone(),
        )
        .await
        .unwrap();
        (manager, store)
    }

    fn fresh() -> Credential {
        Credential {
            access_token: Some(String::from("held-access")),
            refresh_token: Some(String::from("held-refresh")),
            expires_at_epoch_ms: epoch_ms_now() + 3_600_000,
        }
    }

    fn stale() -> Credential {
        Credential {
            access_token: Some(String::from("held-access")),
            refresh_token: Some(String::from("held-refresh")),
            expires_at_epoch_ms: epoch_ms_now() + 2_000,
        }
    }

    #[tokio::test]
    async fn fresh_token_needs_no_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/o/token")
            .expect(0)
            .create_async()
            .await;

        let (manager, _) = manager_with(&server, fresh()).await;
        let token = manager.ensure_valid_access_token().await.unwrap();

        assert_eq!(token, "held-access");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stale_token_refreshes_once_and_persists() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/o/token")
            .with_status(200)
            .with_body(TOKEN_BODY)
            .expect(1)
            .create_async()
            .await;

        let (manager, store) = manager_with(&server, stale()).await;
        let token = manager.ensure_valid_access_token().await.unwrap();

        assert_eq!(token, "new-access");
        let mirrored = store.load().await.unwrap().unwrap();
        assert_eq!(mirrored.refresh_token.as_deref(), Some("new-refresh"));
        assert!(mirrored.expires_at_epoch_ms > epoch_ms_now() + 3_000_000);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/o/token")
            .with_status(200)
            .with_body(TOKEN_BODY)
            .expect(1)
            .create_async()
            .await;

        let (manager, _) = manager_with(&server, stale()).await;
        let (a, b) = tokio::join!(
            manager.ensure_valid_access_token(),
            manager.ensure_valid_access_token()
        );

        assert_eq!(a.unwrap(), "new-access");
        assert_eq!(b.unwrap(), "new-access");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_grant_purges_the_credential() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/o/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let (manager, store) = manager_with(&server, stale()).await;
        let err = manager.ensure_valid_access_token().await.unwrap_err();

        assert!(matches!(err, TokenManagerError::RefreshRejected));
        assert!(store.load().await.unwrap().unwrap().is_empty());
        assert!(!manager.has_refresh_token().await);
    }

    #[tokio::test]
    async fn other_refresh_failures_keep_the_credential() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/o/token")
            .with_status(503)
            .with_body("try later")
            .create_async()
            .await;

        let (manager, store) = manager_with(&server, stale()).await;
        let err = manager.ensure_valid_access_token().await.unwrap_err();

        assert!(matches!(
            err,
            TokenManagerError::ExchangeFailed { status: 503, .. }
        ));
        assert_eq!(
            store.load().await.unwrap().unwrap().refresh_token.as_deref(),
            Some("held-refresh")
        );
    }

    #[tokio::test]
    async fn missing_refresh_token_is_terminal() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/o/token")
            .expect(0)
            .create_async()
            .await;

        let (manager, _) = manager_with(
            &server,
            Credential {
                access_token: Some(String::from("held-access")),
                refresh_token: None,
                expires_at_epoch_ms: 0,
            },
        )
        .await;
        let err = manager.ensure_valid_access_token().await.unwrap_err();

        assert!(matches!(err, TokenManagerError::NoRefreshToken));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn code_exchange_stores_the_credential() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/o/token")
            .with_status(200)
            .with_body(TOKEN_BODY)
            .create_async()
            .await;

        let (manager, store) = manager_with(&server, Credential::empty()).await;
        let creds = manager
            .complete_authorization(&AuthCode::new("the-code"))
            .await
            .unwrap();

        assert_eq!(creds.access_token.as_deref(), Some("new-access"));
        assert_eq!(store.load().await.unwrap(), Some(creds));
    }

    #[tokio::test]
    async fn denied_code_exchange_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/o/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_request"}"#)
            .create_async()
            .await;

        let (manager, _) = manager_with(&server, Credential::empty()).await;
        let err = manager
            .complete_authorization(&AuthCode::new("bad-code"))
            .await
            .unwrap_err();

        match err {
            TokenManagerError::ExchangeFailed { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_request"));
            }
            other => panic!("expected ExchangeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn omitted_lifetime_defaults_to_an_hour() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/o/token")
            .with_status(200)
            .with_body(r#"{"access_token":"new-access","refresh_token":"new-refresh"}"#)
            .create_async()
            .await;

        let (manager, store) = manager_with(&server, stale()).await;
        manager.ensure_valid_access_token().await.unwrap();

        let expires = store.load().await.unwrap().unwrap().expires_at_epoch_ms;
        let now = epoch_ms_now();
        assert!(expires > now + 3_590_000 && expires < now + 3_610_000);
    }
}
