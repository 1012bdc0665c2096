/// An Error returned by an [OAuth server](super::oauth).
#[derive(Debug)]
pub enum OAuthServerError {
    /// An error returned when the server is first being created.
    OnServerCreate(Box<dyn std::error::Error + Send + Sync>),
    /// An error returned when the server is receiving a request.
    OnReceive(std::io::Error),
    /// An error returned when the server is sending a response.
    OnResponse(std::io::Error),
    /// An error returned if DLive rejects the authorization.
    OnAuth {
        error: String,
        error_description: String,
    },
    /// An error generating random data for the `state` parameter.
    Ring(ring::error::Unspecified),
}

/// An Error returned by a [TokenManager](super::access::TokenManager).
#[derive(Debug)]
pub enum TokenManagerError {
    /// An error returned while making a request to the token endpoint.
    Net(reqwest::Error),
    /// An error returned if a token endpoint response could not be
    /// deserialized.
    BadData(serde_json::Error),
    /// An error returned when a refresh is due but no refresh token is held.
    /// Terminal until the authorization flow is re-run.
    NoRefreshToken,
    /// An error returned when the token endpoint reports the refresh grant
    /// invalid or expired. The held credential has been purged; the
    /// authorization flow must be re-run.
    RefreshRejected,
    /// An error returned when an authorization-code exchange is denied.
    ExchangeFailed { status: u16, body: String },
    /// An error returned by the credential store.
    Store(StoreError),
}

/// An Error returned by a [TokenStore](super::store::TokenStore) backend.
#[derive(Debug)]
pub enum StoreError {
    /// An error reading or writing the backing medium.
    IO(std::io::Error),
    /// An error (de)serializing the stored credential.
    BadData(serde_json::Error),
}

impl std::fmt::Display for TokenManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenManagerError::Net(err) => {
                f.write_fmt(format_args!("Error sending a request to DLive: {err}"))
            }
            TokenManagerError::BadData(err) => {
                f.write_fmt(format_args!("Error parsing a response from DLive: {err}"))
            }
            TokenManagerError::NoRefreshToken => {
                f.write_str("No refresh token is held. Re-run the authorization flow.")
            }
            TokenManagerError::RefreshRejected => f.write_str(
                "DLive rejected the refresh grant. The stored credential has been cleared; re-run the authorization flow.",
            ),
            TokenManagerError::ExchangeFailed { status, body } => f.write_fmt(format_args!(
                "Error {status} exchanging an authorization code: {body}"
            )),
            TokenManagerError::Store(err) => {
                f.write_fmt(format_args!("Error accessing the credential store: {err}"))
            }
        }
    }
}
impl std::error::Error for TokenManagerError {}
impl From<StoreError> for TokenManagerError {
    fn from(value: StoreError) -> Self {
        TokenManagerError::Store(value)
    }
}
impl From<reqwest::Error> for TokenManagerError {
    fn from(value: reqwest::Error) -> Self {
        TokenManagerError::Net(value)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::IO(err) => {
                f.write_fmt(format_args!("Error accessing the credential store: {err}"))
            }
            StoreError::BadData(err) => f.write_fmt(format_args!(
                "Error parsing the stored credential: {err}"
            )),
        }
    }
}
impl std::error::Error for StoreError {}
impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::IO(value)
    }
}
impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::BadData(value)
    }
}

impl std::fmt::Display for OAuthServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuthServerError::OnServerCreate(err) => f.write_fmt(format_args!(
                "Error while creating the authentification server: {err}"
            )),
            OAuthServerError::OnReceive(err) => f.write_fmt(format_args!(
                "Error while trying to receive a request to the server: {err}"
            )),
            OAuthServerError::OnResponse(err) => f.write_fmt(format_args!(
                "Error while trying to send a response from the server: {err}"
            )),
            OAuthServerError::OnAuth {
                error,
                error_description,
            } => f.write_fmt(format_args!(
                "Error {error} while validating the user's credentials: {error_description}"
            )),
            OAuthServerError::Ring(err) => {
                f.write_fmt(format_args!("Error while creating random data: {err}"))
            }
        }
    }
}
impl std::error::Error for OAuthServerError {}
