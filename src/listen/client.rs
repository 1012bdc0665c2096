use super::data::{self, ChatEvent, SessionStatus};
use super::error::ListenError;
use super::ListenerData;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

type Websocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Maintains the subscription to a streamer's chat, reconnecting with a
/// fixed backoff for as long as it is enabled.
///
/// An explicit retry loop owns the connection; `stop` flips a watch signal
/// that cancels both the live socket and any pending backoff timer.
#[derive(Debug)]
pub struct ChatListener {
    data: ListenerData,
    shared: Arc<Shared>,
    events: mpsc::Sender<ChatEvent>,
    event_slot: Option<mpsc::Receiver<ChatEvent>>,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    status: Mutex<SessionStatus>,
    retries: AtomicU32,
}

enum StreamEnd {
    Closed,
    Stopped,
}

impl ChatListener {
    #[must_use]
    pub fn new(data: ListenerData) -> Self {
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        ChatListener {
            data,
            shared: Arc::new(Shared {
                status: Mutex::new(SessionStatus::Disconnected),
                retries: AtomicU32::new(0),
            }),
            events,
            event_slot: Some(receiver),
            stop: watch::channel(false).0,
            task: None,
        }
    }

    /// The receiving end of the event stream. Yields once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ChatEvent>> {
        self.event_slot.take()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.shared.status.lock().unwrap()
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.shared.retries.load(Ordering::Relaxed)
    }

    /// Begins listening. A no-op while the listener is already connecting
    /// or connected, so a duplicate subscription cannot happen.
    pub fn start(&mut self) {
        if self.status() != SessionStatus::Disconnected {
            return;
        }
        // Status is Disconnected during a backoff wait too; the loop itself
        // may still be alive.
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        self.stop.send_replace(false);
        self.shared.set_status(SessionStatus::Connecting);

        let run = run_loop(
            self.data.clone(),
            self.shared.clone(),
            self.events.clone(),
            self.stop.subscribe(),
        );
        self.task = Some(tokio::spawn(run));
    }

    /// Tears down the active connection and suppresses the reconnect loop.
    /// A later `start` re-establishes cleanly.
    pub fn stop(&mut self) {
        self.stop.send_replace(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.shared.set_status(SessionStatus::Disconnected);
        tracing::debug!(retries = self.retry_count(), "listen: stopped");
    }
}

impl Drop for ChatListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Shared {
    fn set_status(&self, status: SessionStatus) {
        *self.status.lock().unwrap() = status;
    }
}

async fn run_loop(
    data: ListenerData,
    shared: Arc<Shared>,
    events: mpsc::Sender<ChatEvent>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }
        shared.set_status(SessionStatus::Connecting);

        match connect_and_listen(&data, &shared, &events, &mut stop).await {
            Ok(StreamEnd::Stopped) => break,
            Ok(StreamEnd::Closed) => {
                tracing::debug!(streamer = %data.streamer, "listen: stream completed")
            }
            Err(err) => tracing::warn!(streamer = %data.streamer, "listen: {err}"),
        }

        shared.set_status(SessionStatus::Disconnected);
        shared.retries.fetch_add(1, Ordering::Relaxed);

        tokio::select! {
            _ = tokio::time::sleep(data.backoff) => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
    shared.set_status(SessionStatus::Disconnected);
}

async fn connect_and_listen(
    data: &ListenerData,
    shared: &Shared,
    events: &mpsc::Sender<ChatEvent>,
    stop: &mut watch::Receiver<bool>,
) -> Result<StreamEnd, ListenError> {
    // The transport authenticates at handshake time, not per frame, so a
    // valid token is needed before dialing.
    let token = data
        .access
        .ensure_valid_access_token()
        .await
        .map_err(ListenError::Access)?;

    let mut websocket =
        tokio::time::timeout(data.connect_timeout, connect_websocket(&data.endpoint))
            .await
            .map_err(|_| ListenError::ConnectTimeout)?
            .map_err(ListenError::OnConnect)?;

    handshake(&mut websocket, &token, &data.streamer).await?;
    shared.set_status(SessionStatus::Connected);
    shared.retries.store(0, Ordering::Relaxed);
    tracing::info!(streamer = %data.streamer, "listen: subscribed to chat");

    loop {
        tokio::select! {
            message = websocket.next() => {
                let Some(message) = message.transpose().map_err(ListenError::OnReceive)? else {
                    return Ok(StreamEnd::Closed);
                };
                match message {
                    Message::Text(text) => {
                        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                            tracing::debug!("listen: dropping an unparseable frame");
                            continue;
                        };
                        match frame.get("type").and_then(Value::as_str) {
                            Some("data") => {
                                for event in data::events_from_frame(&frame) {
                                    shared.set_status(SessionStatus::Dispatching);
                                    let _ = events.send(event).await;
                                    shared.set_status(SessionStatus::Connected);
                                }
                            }
                            Some("ka") => {}
                            Some("complete" | "error" | "connection_error") => {
                                return Ok(StreamEnd::Closed);
                            }
                            _ => {}
                        }
                    }
                    Message::Ping(payload) => websocket
                        .send(Message::Pong(payload))
                        .await
                        .map_err(ListenError::OnSend)?,
                    Message::Close(_) => return Ok(StreamEnd::Closed),
                    _ => (),
                }
            }
            _ = stop.changed() => {
                if *stop.borrow() {
                    let _ = websocket.close(None).await;
                    return Ok(StreamEnd::Stopped);
                }
            }
        }
    }
}

async fn connect_websocket(endpoint: &str) -> tokio_tungstenite::tungstenite::Result<Websocket> {
    let mut request = endpoint.into_client_request()?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static("graphql-ws"),
    );
    let (websocket, _) = tokio_tungstenite::connect_async_tls_with_config(
        request,
        None,
        false,
        Some(tokio_tungstenite::Connector::Rustls(
            super::tls::create_websocket_tls_client(),
        )),
    )
    .await?;
    Ok(websocket)
}

async fn handshake(
    websocket: &mut Websocket,
    token: &str,
    streamer: &str,
) -> Result<(), ListenError> {
    let init = serde_json::json!({
        "type": "connection_init",
        "payload": { "Authorization": token },
    });
    websocket
        .send(Message::Text(init.to_string()))
        .await
        .map_err(ListenError::OnSend)?;

    while let Some(message) = websocket
        .next()
        .await
        .transpose()
        .map_err(ListenError::OnHandshake)?
    {
        match message {
            Message::Text(text) => {
                let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                match frame.get("type").and_then(Value::as_str) {
                    Some("connection_ack") => {
                        websocket
                            .send(Message::Text(subscribe_frame(streamer).to_string()))
                            .await
                            .map_err(ListenError::OnSend)?;
                        return Ok(());
                    }
                    Some("connection_error") => {
                        return Err(ListenError::HandshakeRejected(text));
                    }
                    _ => continue,
                }
            }
            Message::Ping(payload) => websocket
                .send(Message::Pong(payload))
                .await
                .map_err(ListenError::OnSend)?,
            Message::Close(_) => break,
            _ => continue,
        }
    }

    Err(ListenError::HandshakeIncomplete)
}

fn subscribe_frame(streamer: &str) -> Value {
    serde_json::json!({
        "id": "1",
        "type": "start",
        "payload": {
            "query": "subscription StreamMessages($streamer: String!) {\n  \
                      streamMessageReceived(streamer: $streamer) {\n    \
                      __typename\n    \
                      ... on ChatText {\n      content\n      sender {\n        displayname\n      }\n    }\n  }\n}",
            "variables": { "streamer": streamer },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::super::data::EventKind;
    use super::*;
    use crate::auth::access::TokenManager;
    use crate::auth::creds::epoch_ms_now;
    use crate::auth::store::{MemoryTokenStore, TokenStore};
    use crate::auth::{Credential, TokenManagerData};
    use serde_json::json;
    use std::time::{Duration, Instant};
    use tokio::time::timeout;

    async fn offline_token_manager() -> TokenManager {
        let store = std::sync::Arc::new(MemoryTokenStore::new());
        store
            .save(&Credential {
                access_token: Some(String::from("held-access")),
                refresh_token: Some(String::from("held-refresh")),
                expires_at_epoch_ms: epoch_ms_now() + 3_600_000,
            })
            .await
            .unwrap();
        TokenManager::new(
            TokenManagerData {
                client_id: String::from("client-id"),
                client_secret: String::from("client-secret"),
                redirect_uri: String::from("http://localhost:3000/oauth/callback"),
                token_url: String::from("http://127.0.0.1:9/o/token"),
                request_timeout: Duration::from_secs(1),
            },
            store,
        )
        .await
        .unwrap()
    }

    /// Serves the graphql-ws handshake, pushes `data_frames` once the start
    /// frame arrives, then optionally hangs up. Reports each accepted
    /// connection.
    async fn spawn_chat_server(
        drop_after_subscribe: bool,
        data_frames: Vec<Value>,
    ) -> (String, mpsc::UnboundedReceiver<Instant>) {
        let (connections, accepted) = mpsc::unbounded_channel();
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (stream, _) = socket.accept().await.unwrap();
                let _ = connections.send(Instant::now());
                let frames = data_frames.clone();
                tokio::spawn(async move {
                    let mut websocket = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(message)) = websocket.next().await {
                        let Message::Text(text) = message else { continue };
                        let frame: Value = serde_json::from_str(&text).unwrap();
                        match frame["type"].as_str() {
                            Some("connection_init") => {
                                websocket
                                    .send(Message::Text(
                                        json!({"type": "connection_ack"}).to_string(),
                                    ))
                                    .await
                                    .unwrap();
                            }
                            Some("start") => {
                                for data_frame in &frames {
                                    websocket
                                        .send(Message::Text(data_frame.to_string()))
                                        .await
                                        .unwrap();
                                }
                                if drop_after_subscribe {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    let _ = websocket.close(None).await;
                });
            }
        });
        (format!("ws://{addr}"), accepted)
    }

    fn listener_for(endpoint: String, access: TokenManager) -> ChatListener {
        ChatListener::new(ListenerData {
            access,
            streamer: String::from("skrymi"),
            endpoint,
            backoff: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test]
    async fn reconnects_after_the_fixed_backoff() {
        let (endpoint, mut accepted) = spawn_chat_server(true, Vec::new()).await;
        let mut listener = listener_for(endpoint, offline_token_manager().await);
        let _events = listener.take_events().unwrap();
        listener.start();

        let first = timeout(Duration::from_secs(5), accepted.recv())
            .await
            .unwrap()
            .unwrap();
        let second = timeout(Duration::from_secs(5), accepted.recv())
            .await
            .unwrap()
            .unwrap();

        assert!(second.duration_since(first) >= Duration::from_millis(200));
        listener.stop();
    }

    #[tokio::test]
    async fn unreachable_endpoints_keep_retrying() {
        // Bind a port, then free it again: every attempt gets refused.
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        drop(socket);

        let mut listener = listener_for(format!("ws://{addr}"), offline_token_manager().await);
        let _events = listener.take_events().unwrap();
        listener.start();

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(listener.retry_count() >= 2);
        listener.stop();
    }

    #[tokio::test]
    async fn stop_suppresses_the_reconnect() {
        let (endpoint, mut accepted) = spawn_chat_server(true, Vec::new()).await;
        let mut listener = listener_for(endpoint, offline_token_manager().await);
        let _events = listener.take_events().unwrap();
        listener.start();

        timeout(Duration::from_secs(5), accepted.recv())
            .await
            .unwrap()
            .unwrap();
        listener.stop();
        assert_eq!(listener.status(), SessionStatus::Disconnected);

        // Drain whatever was in flight at stop time, then expect silence.
        tokio::time::sleep(Duration::from_millis(400)).await;
        while accepted.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(accepted.try_recv().is_err());
    }

    #[tokio::test]
    async fn start_is_idempotent_while_connected() {
        let (endpoint, mut accepted) = spawn_chat_server(false, Vec::new()).await;
        let mut listener = listener_for(endpoint, offline_token_manager().await);
        let _events = listener.take_events().unwrap();
        listener.start();
        timeout(Duration::from_secs(5), accepted.recv())
            .await
            .unwrap()
            .unwrap();

        listener.start();
        listener.start();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(accepted.try_recv().is_err());
        listener.stop();
    }

    #[tokio::test]
    async fn delivers_parsed_events() {
        let data_frame = json!({
            "type": "data",
            "id": "1",
            "payload": { "data": { "streamMessageReceived": [{
                "__typename": "ChatText",
                "content": "!ping",
                "sender": { "displayname": "alice" },
            }] } },
        });
        let (endpoint, _accepted) = spawn_chat_server(false, vec![data_frame]).await;
        let mut listener = listener_for(endpoint, offline_token_manager().await);
        let mut events = listener.take_events().unwrap();
        listener.start();

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EventKind::Text);
        assert_eq!(event.content, "!ping");
        assert_eq!(event.sender.as_deref(), Some("alice"));
        listener.stop();
    }
}
