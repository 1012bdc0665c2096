//! Outbound chat: one GraphQL mutation per send.
use std::time::Duration;

pub mod client;
pub mod data;
pub mod error;

/// The data to build a [GatewayClient](client::GatewayClient).
///
/// The mutation's role/subscribing argument names are data, not code: the
/// remote schema varies across deployments.
#[derive(Debug, Clone)]
pub struct GatewayClientData {
    pub endpoint: String,
    pub auth_scheme: String,
    pub role_field: String,
    pub subscribing_field: String,
    pub default_role: String,
    pub request_timeout: Duration,
}
