/// An Error returned by a [ChatListener](super::client::ChatListener)
/// connection attempt. Every variant takes the same backoff-retry path.
#[derive(Debug)]
pub enum ListenError {
    /// An error obtaining a valid access token for the handshake.
    Access(crate::auth::error::TokenManagerError),
    /// An error returned while opening the WebSocket.
    OnConnect(tokio_tungstenite::tungstenite::Error),
    /// The WebSocket did not open within the configured timeout.
    ConnectTimeout,
    /// An error returned while performing the subscription handshake.
    OnHandshake(tokio_tungstenite::tungstenite::Error),
    /// The remote rejected the connection-init payload.
    HandshakeRejected(String),
    /// The stream ended before the handshake completed.
    HandshakeIncomplete,
    /// An error returned while receiving a frame.
    OnReceive(tokio_tungstenite::tungstenite::Error),
    /// An error returned while sending a frame.
    OnSend(tokio_tungstenite::tungstenite::Error),
}

impl std::fmt::Display for ListenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenError::Access(err) => f.write_fmt(format_args!(
                "Listen error while trying to get an Access Token: {err}"
            )),
            ListenError::OnConnect(err) => f.write_fmt(format_args!(
                "Listen error while connecting to DLive: {err}"
            )),
            ListenError::ConnectTimeout => {
                f.write_str("Listen: timed out connecting to DLive")
            }
            ListenError::OnHandshake(err) => f.write_fmt(format_args!(
                "Listen error while performing the subscription handshake: {err}"
            )),
            ListenError::HandshakeRejected(body) => f.write_fmt(format_args!(
                "Listen: DLive rejected the subscription handshake: {body}"
            )),
            ListenError::HandshakeIncomplete => {
                f.write_str("Listen: the stream ended during the subscription handshake")
            }
            ListenError::OnReceive(err) => f.write_fmt(format_args!(
                "Listen error while receiving a chat frame: {err}"
            )),
            ListenError::OnSend(err) => {
                f.write_fmt(format_args!("Listen error while sending a frame: {err}"))
            }
        }
    }
}
impl std::error::Error for ListenError {}
