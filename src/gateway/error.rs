/// An Error returned by a [GatewayClient](super::client::GatewayClient).
#[derive(Debug)]
pub enum GatewayError {
    /// An error obtaining a valid access token for the send.
    Auth(crate::auth::error::TokenManagerError),
    /// An error returned while making the mutation request.
    Net(reqwest::Error),
    /// An error returned if the response body could not be deserialized.
    BadData(serde_json::Error),
    /// A non-success HTTP status or a GraphQL-level error array. Carries the
    /// raw status and body for diagnosis; the remote schema varies across
    /// deployments.
    Remote { status: u16, body: String },
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Auth(err) => f.write_fmt(format_args!(
                "Gateway error while trying to get an Access Token: {err}"
            )),
            GatewayError::Net(err) => f.write_fmt(format_args!(
                "Gateway error while sending a chat message: {err}"
            )),
            GatewayError::BadData(err) => f.write_fmt(format_args!(
                "Gateway error while parsing a send acknowledgement: {err}"
            )),
            GatewayError::Remote { status, body } => f.write_fmt(format_args!(
                "Gateway error {status} from the chat endpoint: {body}"
            )),
        }
    }
}
impl std::error::Error for GatewayError {}
impl From<crate::auth::error::TokenManagerError> for GatewayError {
    fn from(value: crate::auth::error::TokenManagerError) -> Self {
        GatewayError::Auth(value)
    }
}
