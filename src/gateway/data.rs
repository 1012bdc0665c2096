use serde_json::Value;

/// The outcome of one successful send: the exact request body that went out
/// (kept for observability) and the remote acknowledgement.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Value,
    pub ack: Value,
}
