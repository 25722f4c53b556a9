//! The single WebSocket connection to the console backend.
//!
//! [`Connection::connect`] spawns one driver task that owns the socket.
//! The driver runs the init handshake, writes queued request frames,
//! resolves responses through the [`Correlator`] and hands every push to
//! the [`PushHandler`] in transport order.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use devconsole_api::{Call, Connection, ConnectionConfig, RequestIdGenerator};
//!
//! let conn = Connection::connect(
//!     ConnectionConfig::default(),
//!     Arc::new(RequestIdGenerator::new()),
//!     Arc::new(|push| println!("{push:?}")),
//!     Arc::new(|reason: &str| eprintln!("{reason}")),
//! )?;
//! conn.init_connections().await?;
//! let pong = conn.send_request(Call::Ping, vec!["hello".into()]).await?;
//! ```

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::close::{self, ABNORMAL, NO_STATUS, TLS_HANDSHAKE};
use crate::correlator::{Correlator, PendingResponse, RequestIdGenerator};
use crate::error::Error;
use crate::protocol::{Call, Message, MessageType, PackedRequest, RequestId};
use crate::push::{Push, PushHandler};
use crate::transport::ConnectionConfig;

/// Receives connection-wide failures as human-readable text.
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

const NOT_CONNECTED: &str = "WebSocket not connected";

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the connection.
///
/// `Connecting → Open → {ClosedNormal, ClosedError}`. Both closed states
/// are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    ClosedNormal,
    /// `code` is `None` when the backend refused the init handshake.
    ClosedError { code: Option<u16>, reason: String },
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedNormal | Self::ClosedError { .. })
    }
}

// ── Connection ───────────────────────────────────────────────────────

/// Handle to the connection. Cheaply cloneable.
///
/// Dropping every handle closes the socket.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    config: ConnectionConfig,
    ids: Arc<RequestIdGenerator>,
    correlator: Arc<Correlator>,
    state: Arc<watch::Sender<ConnectionState>>,
    ready: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<tungstenite::Message>,
    on_error: ErrorCallback,
    cancel: CancellationToken,
}

impl Connection {
    /// Start connecting in the background and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        config: ConnectionConfig,
        ids: Arc<RequestIdGenerator>,
        pushes: Arc<dyn PushHandler>,
        on_error: ErrorCallback,
    ) -> Result<Self, Error> {
        let url = config.websocket_url()?;
        let correlator = Correlator::new(config.timeout);
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state);
        let ready = Arc::new(AtomicBool::new(false));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let driver = Driver {
            config: config.clone(),
            correlator: Arc::clone(&correlator),
            state: Arc::clone(&state),
            ready: Arc::clone(&ready),
            pushes,
            on_error: Arc::clone(&on_error),
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run(url, outbound_rx));

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                config,
                ids,
                correlator,
                state,
                ready,
                outbound,
                on_error,
                cancel,
            }),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Number of requests still awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_len()
    }

    /// Wait until the init handshake has completed.
    ///
    /// Fails if the connection closes with an error first, or if nothing
    /// settles within the request timeout. Once the handshake has
    /// succeeded this returns `Ok` immediately for the rest of the
    /// connection's life.
    pub async fn init_connections(&self) -> Result<(), Error> {
        if self.inner.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut rx = self.inner.state.subscribe();
        let deadline = Instant::now() + self.inner.config.timeout;
        let settled = tokio::time::timeout_at(
            deadline,
            rx.wait_for(|s| matches!(s, ConnectionState::Open | ConnectionState::ClosedError { .. })),
        )
        .await;

        match settled {
            Ok(Ok(state)) => match &*state {
                ConnectionState::ClosedError { code: None, reason } => Err(Error::Authentication {
                    message: reason.clone(),
                }),
                ConnectionState::ClosedError { reason, .. } => Err(Error::ConnectionClosed {
                    reason: reason.clone(),
                }),
                _ => Ok(()),
            },
            Ok(Err(_)) => Err(Error::ConnectionClosed {
                reason: "connection driver stopped".into(),
            }),
            Err(_) => Err(Error::Timeout {
                timeout: self.inner.config.timeout,
            }),
        }
    }

    /// Queue a request frame and return its pending response.
    ///
    /// Fails fast with [`Error::NotConnected`] when the socket is not
    /// open, after reporting it through the error callback.
    pub fn send(&self, call: Call, args: Vec<String>) -> Result<PendingResponse, Error> {
        if !self.inner.state.borrow().is_open() {
            return Err(self.not_connected());
        }

        let id = self.inner.ids.next_id();
        let frame = serde_json::to_string(&PackedRequest::new(id, call, args))?;
        let pending = self.inner.correlator.register(id);

        if self
            .inner
            .outbound
            .send(tungstenite::Message::text(frame))
            .is_err()
        {
            self.inner.correlator.evict(id);
            return Err(self.not_connected());
        }

        tracing::debug!(request_id = %id, %call, "request queued");
        Ok(pending)
    }

    /// Await readiness, send, and await the response.
    pub async fn send_request(&self, call: Call, args: Vec<String>) -> Result<Value, Error> {
        self.init_connections().await?;
        self.send(call, args)?.response().await
    }

    /// Close the socket with a normal close code.
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    fn not_connected(&self) -> Error {
        (self.inner.on_error)(NOT_CONNECTED);
        Error::NotConnected
    }
}

// ── Driver ───────────────────────────────────────────────────────────

/// How a socket session ended.
enum Ending {
    /// We closed it: `close()` or every handle dropped.
    Local,
    /// The peer closed it or the transport failed.
    Remote { code: u16, detail: String },
    /// The backend refused the init handshake.
    Refused { reason: String },
}

struct Driver {
    config: ConnectionConfig,
    correlator: Arc<Correlator>,
    state: Arc<watch::Sender<ConnectionState>>,
    ready: Arc<AtomicBool>,
    pushes: Arc<dyn PushHandler>,
    on_error: ErrorCallback,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(self, url: Url, mut outbound: mpsc::UnboundedReceiver<tungstenite::Message>) {
        let ending = self.connect_and_read(&url, &mut outbound).await;
        self.finish(ending);
        tracing::debug!("connection driver exiting");
    }

    async fn connect_and_read(
        &self,
        url: &Url,
        outbound: &mut mpsc::UnboundedReceiver<tungstenite::Message>,
    ) -> Ending {
        tracing::info!(url = %url, "connecting to console backend");

        let uri = match url.as_str().parse::<tungstenite::http::Uri>() {
            Ok(uri) => uri,
            Err(e) => {
                return Ending::Remote {
                    code: ABNORMAL,
                    detail: e.to_string(),
                };
            }
        };

        let connected = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ending::Local,
            result = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri)) => result,
        };
        let ws_stream = match connected {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket connect failed");
                return Ending::Remote {
                    code: connect_failure_code(&e, self.config.secure),
                    detail: e.to_string(),
                };
            }
        };

        tracing::info!("WebSocket connected");
        let (mut write, mut read) = ws_stream.split();

        // The handshake is an ordinary pending request keyed by the
        // sentinel id, so it shares the request timeout.
        let handshake = self.correlator.register(RequestId::INIT).response();
        tokio::pin!(handshake);
        let mut handshaking = true;

        let init = PackedRequest::new(
            RequestId::INIT,
            Call::Init,
            vec![
                self.config.username.clone(),
                self.config.password.expose_secret().to_owned(),
            ],
        );
        let sent = match serde_json::to_string(&init) {
            Ok(frame) => write.send(tungstenite::Message::text(frame)).await,
            Err(e) => {
                return Ending::Remote {
                    code: ABNORMAL,
                    detail: e.to_string(),
                };
            }
        };
        if let Err(e) = sent {
            return Ending::Remote {
                code: ABNORMAL,
                detail: e.to_string(),
            };
        }

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let _ = write.send(normal_close()).await;
                    return Ending::Local;
                }
                outcome = &mut handshake, if handshaking => {
                    handshaking = false;
                    if let Some(reason) = self.complete_handshake(outcome) {
                        let _ = write.send(normal_close()).await;
                        return Ending::Refused { reason };
                    }
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(tungstenite::Message::Text(text))) => self.dispatch(&text),
                        Some(Ok(tungstenite::Message::Close(frame))) => {
                            let (code, detail) = frame.map_or_else(
                                || (NO_STATUS, String::new()),
                                |cf| (u16::from(cf.code), cf.reason.to_string()),
                            );
                            tracing::info!(code, reason = %detail, "WebSocket close frame received");
                            return Ending::Remote { code, detail };
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tungstenite queues the pong itself
                            tracing::trace!("WebSocket ping");
                        }
                        Some(Ok(_)) => {
                            // Binary, Pong, Frame -- not part of the protocol
                        }
                        Some(Err(e)) => {
                            return Ending::Remote { code: ABNORMAL, detail: e.to_string() };
                        }
                        None => {
                            tracing::info!("WebSocket stream ended");
                            return Ending::Remote { code: ABNORMAL, detail: String::new() };
                        }
                    }
                }
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        // every Connection handle is gone
                        let _ = write.send(normal_close()).await;
                        return Ending::Local;
                    };
                    if let Err(e) = write.send(frame).await {
                        return Ending::Remote { code: ABNORMAL, detail: e.to_string() };
                    }
                }
            }
        }
    }

    /// Returns the refusal reason if the backend rejected the credentials.
    fn complete_handshake(&self, outcome: Result<Value, Error>) -> Option<String> {
        match outcome {
            Ok(Value::String(reason)) => {
                tracing::warn!(reason = %reason, "init handshake refused");
                Some(reason)
            }
            Ok(_) => {
                let opened = self.state.send_if_modified(|s| {
                    if matches!(s, ConnectionState::Connecting) {
                        *s = ConnectionState::Open;
                        true
                    } else {
                        false
                    }
                });
                if opened {
                    self.ready.store(true, Ordering::Release);
                    tracing::info!("console session ready");
                }
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "init handshake did not complete");
                None
            }
        }
    }

    /// Route one inbound text frame.
    fn dispatch(&self, text: &str) {
        let message: Message = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "failed to parse inbound envelope");
                return;
            }
        };
        tracing::trace!(
            request_id = %message.request_id,
            message_type = message.message_type,
            "frame received"
        );

        if message.request_id == RequestId::INIT {
            self.correlator.resolve(RequestId::INIT, message.payload);
            return;
        }

        let Some(kind) = message.kind() else {
            tracing::debug!(message_type = message.message_type, "ignoring unknown message type");
            return;
        };

        if kind == MessageType::Response {
            self.correlator.resolve(message.request_id, message.payload);
            return;
        }

        match Push::decode(kind, &message.payload) {
            Ok(Some(push)) => self.pushes.on_push(push),
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, %kind, "dropping malformed push"),
        }
    }

    fn finish(&self, ending: Ending) {
        match ending {
            Ending::Local => {
                self.enter_closed(ConnectionState::ClosedNormal);
                self.correlator.fail_all("Connection closed");
            }
            Ending::Remote { code, detail } => {
                match close::close_reason(code, &detail, &self.config.origin()) {
                    None => {
                        tracing::info!(code, "connection closed normally");
                        self.enter_closed(ConnectionState::ClosedNormal);
                    }
                    Some(reason) => self.fail(Some(code), reason),
                }
            }
            Ending::Refused { reason } => self.fail(None, reason),
        }
    }

    fn fail(&self, code: Option<u16>, reason: String) {
        let entered = self.enter_closed(ConnectionState::ClosedError {
            code,
            reason: reason.clone(),
        });
        if entered {
            tracing::warn!(?code, reason = %reason, "connection failed");
            self.correlator.fail_all(&reason);
            (self.on_error)(&reason);
        }
    }

    /// Move to a closed state unless one was already reached.
    fn enter_closed(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|s| {
            if s.is_closed() {
                false
            } else {
                *s = next;
                true
            }
        })
    }
}

fn normal_close() -> tungstenite::Message {
    tungstenite::Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    }))
}

/// Close code a browser would report for a failed connect.
fn connect_failure_code(err: &tungstenite::Error, secure: bool) -> u16 {
    match err {
        tungstenite::Error::Tls(_) => TLS_HANDSHAKE,
        tungstenite::Error::Io(e) if secure && e.kind() == io::ErrorKind::InvalidData => {
            TLS_HANDSHAKE
        }
        _ => ABNORMAL,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn closed_states_are_terminal() {
        assert!(ConnectionState::ClosedNormal.is_closed());
        assert!(
            ConnectionState::ClosedError {
                code: Some(1006),
                reason: String::new()
            }
            .is_closed()
        );
        assert!(!ConnectionState::Connecting.is_closed());
        assert!(ConnectionState::Open.is_open());
    }

    #[test]
    fn io_failures_map_to_abnormal_closure() {
        let refused = tungstenite::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(connect_failure_code(&refused, false), ABNORMAL);
        assert_eq!(connect_failure_code(&refused, true), ABNORMAL);
    }

    #[test]
    fn invalid_data_on_secure_socket_is_a_tls_failure() {
        let bad_cert = tungstenite::Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid peer certificate",
        ));
        assert_eq!(connect_failure_code(&bad_cert, true), TLS_HANDSHAKE);
        assert_eq!(connect_failure_code(&bad_cert, false), ABNORMAL);
    }

    #[tokio::test]
    async fn send_before_open_fails_fast_and_reports() {
        let reported = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&reported);
        let config = ConnectionConfig {
            // nothing listens on the discard port
            port: 9,
            ..ConnectionConfig::default()
        };

        let conn = Connection::connect(
            config,
            Arc::new(RequestIdGenerator::new()),
            Arc::new(|_: Push| {}),
            Arc::new(move |reason: &str| sink.lock().unwrap().push(reason.to_owned())),
        )
        .unwrap();

        let err = conn.send(Call::Ping, vec![]).unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        // the driver may already have reported the refused connect
        assert!(reported.lock().unwrap().iter().any(|r| r == "WebSocket not connected"));
        assert_eq!(conn.pending_requests(), 0);
    }
}
