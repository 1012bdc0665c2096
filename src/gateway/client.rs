use super::data::Delivery;
use super::error::GatewayError;
use super::GatewayClientData;
use crate::auth::access::TokenManager;
use crate::dlive;
use serde_json::Value;

/// Wraps outbound sends to the DLive GraphQL endpoint, asking the
/// [TokenManager] for a valid credential per call.
///
/// No retry happens in here. A reply that fails to send is the caller's to
/// log and drop.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    access: TokenManager,
    data: GatewayClientData,
    http: reqwest::Client,
}

impl GatewayClient {
    /// # Errors
    /// Returns `Err(GatewayError::Net)` if the HTTP client could not be
    /// built.
    pub fn new(access: TokenManager, data: GatewayClientData) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(data.request_timeout)
            .build()
            .map_err(GatewayError::Net)?;
        Ok(GatewayClient { access, data, http })
    }

    /// Sends `text` into `streamer`'s chat with the configured default room
    /// role, not subscribing.
    ///
    /// # Errors
    /// See [GatewayClient::send_message_as].
    pub async fn send_message(&self, streamer: &str, text: &str) -> Result<Delivery, GatewayError> {
        let role = self.data.default_role.clone();
        self.send_message_as(streamer, text, &role, false).await
    }

    /// Issues one mutation call and returns the exact payload sent plus the
    /// remote acknowledgement.
    ///
    /// # Errors
    /// Returns `Err(GatewayError...)`:
    /// * `::Auth` if no valid access token could be obtained.
    /// * `::Net` if no response was received.
    /// * `::Remote` on a non-success HTTP status or a GraphQL error array,
    ///   carrying the raw status and body.
    /// * `::BadData` if the acknowledgement could not be parsed.
    pub async fn send_message_as(
        &self,
        streamer: &str,
        text: &str,
        role: &str,
        subscribing: bool,
    ) -> Result<Delivery, GatewayError> {
        let token = self.access.ensure_valid_access_token().await?;
        let payload = self.build_payload(streamer, text, role, subscribing);

        let response = self
            .http
            .post(&self.data.endpoint)
            .header(
                "Authorization",
                dlive::auth_header(&self.data.auth_scheme, &token),
            )
            .json(&payload)
            .send()
            .await
            .map_err(GatewayError::Net)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(GatewayError::Net)?;

        if !(200..300).contains(&status) {
            return Err(GatewayError::Remote { status, body });
        }
        let ack = serde_json::from_str::<Value>(&body).map_err(GatewayError::BadData)?;
        if dlive::has_graphql_errors(&ack) {
            return Err(GatewayError::Remote { status, body });
        }

        tracing::debug!(%streamer, "chat message delivered");
        Ok(Delivery { payload, ack })
    }

    fn build_payload(&self, streamer: &str, text: &str, role: &str, subscribing: bool) -> Value {
        // Role is a schema enum, rendered bare; only the argument names come
        // from configuration.
        let query = format!(
            "mutation SendChat($streamer: String!, $message: String!) {{\n  \
             sendChatMessage(streamer: $streamer, message: $message, {}: {role}, {}: {subscribing}) {{\n    \
             id\n    content\n    createdAt\n  }}\n}}",
            self.data.role_field, self.data.subscribing_field,
        );
        serde_json::json!({
            "query": query,
            "variables": {
                "streamer": streamer,
                "message": text,
            },
        })
    }
}
