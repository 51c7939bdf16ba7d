//! Long-lived chat session over a WebSocket.
//!
//! # Lifecycle
//! ```text
//! Idle ──connect──▶ Connecting ──open──▶ Open
//!  ▲                    │                 │
//!  │                    ▼                 ▼
//!  └────disconnect──── Closed ◀──────── close
//!                       │
//!                       └─ abnormal code, under the cap: wait, Connecting
//! ```
//!
//! Each socket attempt gets a generation number. Callbacks from a socket
//! whose generation is no longer current are ignored, so a socket that was
//! replaced or disconnected can never reschedule or dispatch.
//!
//! Handler callbacks are queued while the state lock is held and run on one
//! delivery task, so they arrive in the order the transitions happened.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::{parse_frame, ChatMessage, InboundEvent, MessageId, ReactionUpdate};
use crate::outbound::{action_frame, chat_frame};

/// Close code recorded when the socket dies without a close frame.
const CLOSE_ABNORMAL: u16 = 1006;
/// Close code recorded when the peer sends a close frame without a code.
const CLOSE_NO_STATUS: u16 = 1005;

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Receives classified inbound events and lifecycle changes.
///
/// Callbacks run one at a time on the session's delivery task. A slow
/// callback delays later ones but never reorders them.
pub trait SessionHandler: Send + Sync + 'static {
    fn on_chat_message(&self, _message: ChatMessage) {}
    fn on_reaction(&self, _update: ReactionUpdate) {}
    fn on_message_deleted(&self, _message_id: MessageId) {}
    fn on_user_blocked(&self, _message: String) {}
    fn on_kicked(&self, _message: String) {}
    fn on_state_change(&self, _state: ConnectionState) {}
    /// The reconnect cap was reached after `attempts` failed attempts.
    fn on_reconnect_exhausted(&self, _attempts: u32) {}
}

enum Outbound {
    Frame(String),
    Close,
}

struct Inner {
    state: ConnectionState,
    token: Option<String>,
    reconnect_enabled: bool,
    reconnect_attempt: u32,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    socket_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

enum Notification {
    State(ConnectionState),
    Event(InboundEvent),
    Exhausted(u32),
}

struct Shared {
    config: SessionConfig,
    notify: mpsc::UnboundedSender<Notification>,
    inner: Mutex<Inner>,
}

/// A chat session: at most one live socket, automatic reconnection with a
/// fixed delay and an attempt cap, typed inbound events.
///
/// Must be used from within a Tokio runtime.
pub struct ChatSession {
    shared: Arc<Shared>,
}

impl ChatSession {
    /// Must be called from within a Tokio runtime; it spawns the task that
    /// runs handler callbacks.
    pub fn new(config: SessionConfig, handler: Arc<dyn SessionHandler>) -> Self {
        let (notify, notifications) = mpsc::unbounded_channel();
        tokio::spawn(deliver(handler, notifications));

        Self {
            shared: Arc::new(Shared {
                config,
                notify,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Idle,
                    token: None,
                    reconnect_enabled: false,
                    reconnect_attempt: 0,
                    generation: 0,
                    outbound: None,
                    socket_task: None,
                    reconnect_timer: None,
                }),
            }),
        }
    }

    /// Open the socket. A no-op while connecting or open.
    pub fn connect(&self, token: &str) -> Result<(), SessionError> {
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        let mut inner = self.shared.lock();
        if matches!(
            inner.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            tracing::debug!(state = ?inner.state, "Connect ignored, socket already live");
            return Ok(());
        }

        inner.token = Some(token.to_owned());
        inner.reconnect_enabled = true;
        inner.reconnect_attempt = 0;
        self.shared.start_attempt(&mut inner)?;
        self.shared.notify(Notification::State(ConnectionState::Connecting));
        Ok(())
    }

    /// Close the socket with a normal code and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        inner.reconnect_enabled = false;
        inner.reconnect_attempt = 0;
        inner.generation += 1;
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }

        let outbound = inner.outbound.take();
        let socket_task = inner.socket_task.take();
        match (inner.state, outbound) {
            (ConnectionState::Open, Some(outbound)) => {
                // The socket task sends the close frame and exits on its own.
                let _ = outbound.send(Outbound::Close);
            }
            _ => {
                if let Some(task) = socket_task {
                    task.abort();
                }
            }
        }

        if inner.state != ConnectionState::Idle {
            inner.state = ConnectionState::Idle;
            self.shared.notify(Notification::State(ConnectionState::Idle));
        }
        drop(inner);

        tracing::info!(chat = %self.shared.config.chat_code, "Session disconnected");
    }

    /// Send a chat message. Fails unless the socket is open.
    pub fn send_message(&self, message: &str, reply_to_id: Option<&str>) -> Result<(), SessionError> {
        self.shared
            .send(|token| chat_frame(message, token, reply_to_id))
    }

    /// Send an arbitrary action object. Fails unless the socket is open.
    pub fn send_action(&self, action: serde_json::Value) -> Result<(), SessionError> {
        self.shared.send(|token| action_frame(action, token))
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn reconnect_attempt(&self) -> u32 {
        self.shared.lock().reconnect_attempt
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.reconnect_enabled = false;
        inner.generation += 1;
        inner.outbound = None;
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(task) = inner.socket_task.take() {
            task.abort();
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a callback. Call with the state lock held so queue order
    /// matches transition order.
    fn notify(&self, notification: Notification) {
        // Only fails once the delivery task is gone, i.e. the runtime is
        // shutting down.
        let _ = self.notify.send(notification);
    }

    /// Begin a new socket attempt, discarding whatever came before.
    fn start_attempt(self: &Arc<Self>, inner: &mut Inner) -> Result<(), SessionError> {
        let token = inner.token.as_deref().ok_or(SessionError::MissingToken)?;
        let url = self.config.socket_url(token)?;

        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(task) = inner.socket_task.take() {
            task.abort();
        }

        inner.generation += 1;
        inner.state = ConnectionState::Connecting;

        let (tx, rx) = mpsc::unbounded_channel();
        inner.outbound = Some(tx);

        let generation = inner.generation;
        let shared = Arc::clone(self);
        inner.socket_task = Some(tokio::spawn(async move {
            shared.run_socket(generation, url, rx).await;
        }));
        Ok(())
    }

    async fn run_socket(
        self: Arc<Self>,
        generation: u64,
        url: Url,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
    ) {
        tracing::debug!(chat = %self.config.chat_code, generation, "Opening chat socket");

        let code = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                if !self.opened(generation) {
                    return;
                }
                self.pump(generation, stream, &mut outbound).await
            }
            Err(e) => {
                tracing::warn!(chat = %self.config.chat_code, error = %e, "Chat socket connect failed");
                CLOSE_ABNORMAL
            }
        };

        self.closed(generation, code);
    }

    /// Shuttle frames until the socket closes; returns the close code.
    async fn pump(
        &self,
        generation: u64,
        stream: SocketStream,
        outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    ) -> u16 {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                command = outbound.recv() => match command {
                    Some(Outbound::Frame(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            tracing::debug!(error = %e, "Chat socket write failed");
                            return CLOSE_ABNORMAL;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        };
                        let _ = write.send(Message::Close(Some(frame))).await;
                        return CloseCode::Normal.into();
                    }
                },
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => self.dispatch(generation, text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        let _ = write.close().await;
                        return frame.map_or(CLOSE_NO_STATUS, |frame| frame.code.into());
                    }
                    Some(Ok(_)) => {} // Binary, ping, pong.
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "Chat socket read failed");
                        return CLOSE_ABNORMAL;
                    }
                    None => return CLOSE_ABNORMAL,
                },
            }
        }
    }

    /// Returns false if this attempt has been superseded.
    fn opened(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.state = ConnectionState::Open;
        inner.reconnect_attempt = 0;
        self.notify(Notification::State(ConnectionState::Open));
        drop(inner);

        tracing::info!(chat = %self.config.chat_code, "Chat socket open");
        true
    }

    fn closed(self: &Arc<Self>, generation: u64, code: u16) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }

        inner.state = ConnectionState::Closed;
        inner.outbound = None;
        inner.socket_task = None;

        self.notify(Notification::State(ConnectionState::Closed));

        let normal = code == u16::from(CloseCode::Normal) || code == u16::from(CloseCode::Away);
        if !normal && inner.reconnect_enabled && inner.token.is_some() {
            if self.config.reconnect.allows(inner.reconnect_attempt) {
                inner.reconnect_attempt += 1;
                let attempt = inner.reconnect_attempt;
                let delay = self.config.reconnect.delay();
                tracing::info!(
                    chat = %self.config.chat_code,
                    code,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Chat socket closed abnormally, scheduling reconnect"
                );

                let shared = Arc::clone(self);
                inner.reconnect_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    shared.reconnect(generation);
                }));
            } else {
                let attempts = inner.reconnect_attempt;
                tracing::warn!(chat = %self.config.chat_code, attempts, "Reconnect attempts exhausted");
                self.notify(Notification::Exhausted(attempts));
            }
        } else {
            tracing::info!(chat = %self.config.chat_code, code, "Chat socket closed");
        }
    }

    fn reconnect(self: &Arc<Self>, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation
            || inner.state != ConnectionState::Closed
            || !inner.reconnect_enabled
        {
            return;
        }

        // This is the timer task itself; drop the handle without aborting.
        inner.reconnect_timer = None;
        if let Err(e) = self.start_attempt(&mut inner) {
            tracing::warn!(error = %e, "Reconnect could not start");
            return;
        }
        self.notify(Notification::State(ConnectionState::Connecting));
    }

    fn send(
        &self,
        encode: impl FnOnce(&str) -> Result<String, SessionError>,
    ) -> Result<(), SessionError> {
        let inner = self.lock();
        if inner.state != ConnectionState::Open {
            return Err(SessionError::NotConnected);
        }
        let (Some(token), Some(outbound)) = (inner.token.as_deref(), inner.outbound.as_ref())
        else {
            return Err(SessionError::NotConnected);
        };

        let frame = encode(token)?;
        outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| SessionError::NotConnected)
    }

    fn dispatch(&self, generation: u64, text: &str) {
        let event = match parse_frame(text) {
            Ok(InboundEvent::ProtocolError { error }) => {
                tracing::warn!(error = %error, "Chat backend reported an error");
                return;
            }
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping inbound frame");
                return;
            }
        };

        let inner = self.lock();
        if inner.generation == generation {
            self.notify(Notification::Event(event));
        }
    }
}

/// Run handler callbacks in queue order until the session is gone.
async fn deliver(
    handler: Arc<dyn SessionHandler>,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
) {
    while let Some(notification) = notifications.recv().await {
        match notification {
            Notification::State(state) => handler.on_state_change(state),
            Notification::Exhausted(attempts) => handler.on_reconnect_exhausted(attempts),
            Notification::Event(InboundEvent::ChatMessage(message)) => {
                handler.on_chat_message(message)
            }
            Notification::Event(InboundEvent::Reaction(update)) => handler.on_reaction(update),
            Notification::Event(InboundEvent::MessageDeleted { message_id }) => {
                handler.on_message_deleted(message_id)
            }
            Notification::Event(InboundEvent::UserBlocked { message }) => {
                handler.on_user_blocked(message)
            }
            Notification::Event(InboundEvent::Kicked { message }) => handler.on_kicked(message),
            Notification::Event(InboundEvent::ProtocolError { .. }) => {}
        }
    }
}
