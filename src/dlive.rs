//! DLive platform glue: endpoint defaults and the small response/header
//! conventions shared by the gateway and the listener.
use serde_json::Value;

pub const AUTHORIZE_URL: &str = "https://dlive.tv/o/authorize";
pub const TOKEN_URL: &str = "https://dlive.tv/o/token";
pub const GRAPHQL_URL: &str = "https://graphigo.prd.dlive.tv/";
pub const SUBSCRIPTION_URL: &str = "wss://graphigostream.prd.dlive.tv/";

pub const OAUTH_SCOPES: &[&str] = &["identity", "chat:write"];

/// Builds the Authorization header for the GraphQL endpoints. Deployments
/// differ on whether a scheme prefix ("Bearer") is required; an empty scheme
/// sends the raw token.
#[must_use]
pub fn auth_header(scheme: &str, token: &str) -> String {
    if scheme.is_empty() {
        String::from(token)
    } else {
        format!("{scheme} {token}")
    }
}

/// Whether a GraphQL response envelope carries a non-empty `errors` array.
/// The transport can say 200 while the operation failed.
#[must_use]
pub fn has_graphql_errors(envelope: &Value) -> bool {
    match envelope.get("errors") {
        Some(Value::Array(errors)) => !errors.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}
