//! Per-connection request dispatcher.
//!
//! A [`Dispatcher`] owns one upgraded WebSocket. Its read loop hands every
//! data frame to a [`RequestHandler`] running in its own tokio task, so a
//! slow request never holds up the ones behind it. Handlers write their
//! answers back through [`Dispatcher::send_response`], which serialises
//! writers on a lock so frames never interleave on the wire.
//!
//! # Lifecycle
//!
//! 1. [`Dispatcher::accept`] - upgrade a TCP stream and pick a handler by path
//! 2. [`Dispatcher::listen_and_respond`] - read and dispatch until the peer goes away
//! 3. [`Dispatcher::close`] - wait for in-flight handlers, then close the socket
//!
//! # Backpressure
//!
//! At most `max_in_flight` handlers run per connection. When the limit is
//! reached the read loop stops reading until one finishes, and TCP flow
//! control pushes back on the client.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex as AsyncMutex, Notify, Semaphore};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::pending::InFlight;

// ============================================================================
// Constants
// ============================================================================

/// Default maximum inbound frame size (256 x 256 bytes).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256 * 256;

/// Default deadline for a single outbound write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of handlers allowed to run at once per connection.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

/// Default deadline for a client to complete the upgrade handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// One inbound data frame, opaque to the dispatcher.
pub type Frame = Vec<u8>;

type WsSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;
type WsSource = Pin<Box<dyn Stream<Item = StdResult<Message, WsError>> + Send>>;

// ============================================================================
// RequestHandler
// ============================================================================

/// Processes one inbound frame.
///
/// Each call runs in its own task. Implementations answer through
/// [`Dispatcher::send_response`] and report failures to the client rather
/// than returning them; nothing a handler does can end the connection
/// except a failed write.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Handles `frame`, received on `dispatcher`.
    async fn handle(&self, dispatcher: &Dispatcher, frame: Frame);
}

/// Wraps an async closure as a [`RequestHandler`].
///
/// # Example
///
/// ```ignore
/// let echo = handler_fn(|dispatcher, frame| async move {
///     let text = String::from_utf8_lossy(&frame).into_owned();
///     let _ = dispatcher.send_response(&text).await;
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(Dispatcher, Frame) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Dispatcher, Frame) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, dispatcher: &Dispatcher, frame: Frame) {
        (self.0)(dispatcher.clone(), frame).await;
    }
}

// ============================================================================
// DispatcherOptions
// ============================================================================

/// Per-connection limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherOptions {
    /// Largest inbound frame or message accepted, in bytes.
    pub max_frame_size: usize,
    /// Deadline for writing one response.
    pub write_timeout: Duration,
    /// Handlers allowed to run at once.
    pub max_in_flight: usize,
    /// Deadline for the peer to finish the upgrade handshake.
    pub handshake_timeout: Duration,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl DispatcherOptions {
    /// Returns the WebSocket configuration enforcing these limits.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_frame_size);
        config.max_frame_size = Some(self.max_frame_size);
        config
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Handle to one WebSocket session.
///
/// Cheap to clone; every in-flight handler holds a clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    id: ConnectionId,
    /// Write half. Async lock: held across the write.
    writer: AsyncMutex<WsSink>,
    /// Read half, taken by the read loop.
    reader: Mutex<Option<WsSource>>,
    handler: Arc<dyn RequestHandler>,
    pending: Arc<InFlight>,
    admission: Arc<Semaphore>,
    write_timeout: Duration,
    /// Set after a failed write; no further writes are attempted.
    broken: AtomicBool,
    broken_signal: Notify,
    closing: AtomicBool,
}

impl Dispatcher {
    /// Upgrades `stream` to a WebSocket and builds a dispatcher for it.
    ///
    /// `router` receives the request path and picks the handler; `None`
    /// rejects the upgrade with `404 Not Found`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the upgrade fails, is rejected, or
    /// does not complete within `handshake_timeout`.
    pub async fn accept<S, R>(stream: S, options: &DispatcherOptions, router: R) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        R: FnOnce(&str) -> Option<Arc<dyn RequestHandler>> + Send + Unpin,
    {
        let mut selected = None;

        let callback = |request: &Request,
                        response: Response|
         -> StdResult<Response, ErrorResponse> {
            let path = request.uri().path();
            match router(path) {
                Some(handler) => {
                    selected = Some(handler);
                    Ok(response)
                }
                None => {
                    debug!(path, "Rejecting upgrade for unknown path");
                    Err(not_found(path))
                }
            }
        };

        let upgrade = tokio_tungstenite::accept_hdr_async_with_config(
            stream,
            callback,
            Some(options.websocket_config()),
        );
        let ws = timeout(options.handshake_timeout, upgrade)
            .await
            .map_err(|_| {
                Error::handshake(format!(
                    "no upgrade within {} ms",
                    options.handshake_timeout.as_millis()
                ))
            })?
            .map_err(|e| Error::handshake(e.to_string()))?;

        let handler =
            selected.ok_or_else(|| Error::handshake("upgrade completed without a handler"))?;

        Ok(Self::from_stream(ws, options, handler))
    }

    /// Builds a dispatcher over an already upgraded WebSocket.
    ///
    /// Frame size limits are whatever `ws` was configured with.
    pub fn from_stream<S>(
        ws: WebSocketStream<S>,
        options: &DispatcherOptions,
        handler: Arc<dyn RequestHandler>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, source) = ws.split();
        let id = ConnectionId::generate();

        debug!(%id, "Session established");

        Self {
            inner: Arc::new(DispatcherInner {
                id,
                writer: AsyncMutex::new(Box::pin(sink)),
                reader: Mutex::new(Some(Box::pin(source))),
                handler,
                pending: InFlight::new(),
                admission: Arc::new(Semaphore::new(options.max_in_flight)),
                write_timeout: options.write_timeout,
                broken: AtomicBool::new(false),
                broken_signal: Notify::new(),
                closing: AtomicBool::new(false),
            }),
        }
    }

    /// Returns this session's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the number of handlers still running.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.count()
    }

    /// Returns `true` once a write has failed.
    #[inline]
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.inner.broken.load(Ordering::Acquire)
    }

    /// Reads frames and dispatches each to the handler until the
    /// connection ends.
    ///
    /// Returns `Ok(())` when the peer closes the connection or the stream
    /// ends. Handlers may still be running; call [`close`](Self::close)
    /// afterwards.
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if reading fails
    /// - [`Error::Connection`] if a response write failed
    /// - [`Error::Protocol`] if called more than once
    pub async fn listen_and_respond(&self) -> Result<()> {
        let mut reader = self
            .inner
            .reader
            .lock()
            .take()
            .ok_or_else(|| Error::protocol("listen_and_respond called more than once"))?;

        let id = self.inner.id;

        loop {
            if self.is_broken() {
                return Err(Error::connection("response write failed"));
            }

            let message = tokio::select! {
                message = reader.next() => message,
                () = self.inner.broken_signal.notified() => continue,
            };

            match message {
                Some(Ok(Message::Text(text))) => self.dispatch(text.as_bytes().to_vec()).await?,

                Some(Ok(Message::Binary(data))) => self.dispatch(data.to_vec()).await?,

                Some(Ok(Message::Close(frame))) => {
                    debug!(%id, ?frame, "Connection ended by peer");
                    return Ok(());
                }

                // Ping, Pong and raw frames
                Some(Ok(_)) => {}

                Some(Err(e)) => {
                    let e = Error::from(e);
                    if e.is_connection_closed() {
                        debug!(%id, "Connection ended");
                        return Ok(());
                    }
                    warn!(%id, error = %e, "Read failed");
                    return Err(e);
                }

                None => {
                    debug!(%id, "Connection ended");
                    return Ok(());
                }
            }
        }
    }

    /// Writes `value` to the client as one JSON text frame.
    ///
    /// Concurrent callers are serialised. A failed or timed out write marks
    /// the connection broken and stops the read loop.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if `value` cannot be serialised (connection unaffected)
    /// - [`Error::ConnectionClosed`] if an earlier write already failed
    /// - [`Error::WriteTimeout`] if the write exceeds the deadline
    /// - [`Error::WebSocket`] if the write fails
    pub async fn send_response<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_string(value)?;
        let len = json.len();

        let mut writer = self.inner.writer.lock().await;
        if self.is_broken() {
            return Err(Error::ConnectionClosed);
        }

        match timeout(self.inner.write_timeout, writer.send(Message::Text(json.into()))).await {
            Ok(Ok(())) => {
                trace!(id = %self.inner.id, len, "Response sent");
                Ok(())
            }
            Ok(Err(e)) => {
                let e = Error::from(e);
                self.mark_broken(&e);
                Err(e)
            }
            Err(_) => {
                let e = Error::write_timeout(self.inner.write_timeout.as_millis() as u64);
                self.mark_broken(&e);
                Err(e)
            }
        }
    }

    /// Waits for every in-flight handler, then closes the socket.
    ///
    /// Handlers may keep sending while this waits. Calling it again
    /// returns immediately.
    pub async fn close(&self) {
        if self.inner.closing.swap(true, Ordering::AcqRel) {
            return;
        }

        let id = self.inner.id;
        let pending = self.pending_count();
        if pending > 0 {
            debug!(%id, pending, "Waiting for in-flight handlers");
        }
        self.inner.pending.wait_idle().await;

        let mut writer = self.inner.writer.lock().await;
        if self.is_broken() {
            debug!(%id, "Session closed without close frame");
            return;
        }

        match timeout(self.inner.write_timeout, writer.close()).await {
            Ok(Ok(())) => debug!(%id, "Session closed"),
            Ok(Err(e)) => debug!(%id, error = %e, "Close frame not delivered"),
            Err(_) => debug!(%id, "Close frame timed out"),
        }
    }

    /// Spawns the handler for `frame` once an admission permit is free.
    async fn dispatch(&self, frame: Frame) -> Result<()> {
        let permit = Arc::clone(&self.inner.admission)
            .acquire_owned()
            .await
            .map_err(|_| Error::protocol("admission semaphore closed"))?;
        let guard = self.inner.pending.enter();

        trace!(
            id = %self.inner.id,
            len = frame.len(),
            pending = self.pending_count(),
            "Dispatching frame"
        );

        let dispatcher = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            let handler = Arc::clone(&dispatcher.inner.handler);
            handler.handle(&dispatcher, frame).await;
        });

        Ok(())
    }

    fn mark_broken(&self, error: &Error) {
        if !self.inner.broken.swap(true, Ordering::AcqRel) {
            warn!(id = %self.inner.id, error = %error, "Response write failed, ending session");
            self.inner.broken_signal.notify_one();
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("id", &self.inner.id)
            .field("pending", &self.pending_count())
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("no handler for '{path}'")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use serde_json::{Value, json};
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    type Client = WebSocketStream<DuplexStream>;

    async fn pair(
        options: &DispatcherOptions,
        handler: Arc<dyn RequestHandler>,
    ) -> (Dispatcher, Client) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (Dispatcher::from_stream(server, options, handler), client)
    }

    fn index_of(frame: &[u8]) -> u64 {
        serde_json::from_slice::<Value>(frame)
            .ok()
            .and_then(|v| v["n"].as_u64())
            .unwrap_or(u64::MAX)
    }

    async fn read_json(client: &mut Client) -> Value {
        loop {
            match client.next().await.expect("open").expect("readable") {
                Message::Text(text) => {
                    return serde_json::from_str(text.as_str()).expect("one JSON document");
                }
                Message::Close(_) => panic!("unexpected close"),
                _ => {}
            }
        }
    }

    #[test]
    fn test_default_options() {
        let options = DispatcherOptions::default();
        assert_eq!(options.max_frame_size, 65_536);
        assert_eq!(options.write_timeout, Duration::from_secs(10));
        assert_eq!(options.max_in_flight, 1024);
        assert_eq!(options.handshake_timeout, Duration::from_secs(10));

        let config = options.websocket_config();
        assert_eq!(config.max_message_size, Some(65_536));
        assert_eq!(config.max_frame_size, Some(65_536));
    }

    #[tokio::test]
    async fn test_responses_arrive_in_completion_order() {
        let handler = handler_fn(|dispatcher, frame| async move {
            let n = index_of(&frame);
            tokio::time::sleep(Duration::from_millis(20 * (3 - n))).await;
            dispatcher.send_response(&json!({ "n": n })).await.expect("sent");
        });
        let (dispatcher, mut client) = pair(&DispatcherOptions::default(), handler).await;

        let listener = dispatcher.clone();
        let listen = tokio::spawn(async move { listener.listen_and_respond().await });

        for n in 0..4 {
            client.send(Message::Text(json!({ "n": n }).to_string().into())).await.expect("sent");
        }

        let mut order = Vec::new();
        for _ in 0..4 {
            order.push(read_json(&mut client).await["n"].as_u64().expect("n"));
        }
        assert_eq!(order, vec![3, 2, 1, 0]);

        client.close(None).await.expect("close sent");
        listen.await.expect("listen task").expect("orderly close");
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn test_close_waits_for_pending_handlers() {
        let attempted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempted);
        let handler = handler_fn(move |dispatcher, frame| {
            let counter = Arc::clone(&counter);
            async move {
                let n = index_of(&frame);
                tokio::time::sleep(Duration::from_millis(10 * (8 - n))).await;
                let _ = dispatcher.send_response(&json!({ "n": n })).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let (dispatcher, mut client) = pair(&DispatcherOptions::default(), handler).await;

        for n in 0..8 {
            client.send(Message::Text(json!({ "n": n }).to_string().into())).await.expect("sent");
        }
        client.close(None).await.expect("close sent");

        dispatcher.listen_and_respond().await.expect("orderly close");
        dispatcher.close().await;

        assert_eq!(attempted.load(Ordering::SeqCst), 8);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_responses_do_not_interleave() {
        let handler = handler_fn(|dispatcher, frame| async move {
            let n = index_of(&frame);
            let fill = "x".repeat(16 * 1024);
            dispatcher.send_response(&json!({ "n": n, "fill": fill })).await.expect("sent");
        });
        let (dispatcher, mut client) = pair(&DispatcherOptions::default(), handler).await;

        let listener = dispatcher.clone();
        let listen = tokio::spawn(async move { listener.listen_and_respond().await });

        for n in 0..16 {
            client.send(Message::Text(json!({ "n": n }).to_string().into())).await.expect("sent");
        }

        let mut seen: Vec<u64> = Vec::new();
        for _ in 0..16 {
            let value = read_json(&mut client).await;
            assert_eq!(value["fill"].as_str().map(str::len), Some(16 * 1024));
            seen.push(value["n"].as_u64().expect("n"));
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());

        client.close(None).await.expect("close sent");
        listen.await.expect("listen task").expect("orderly close");
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn test_admission_limit_serialises_handlers() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let handler = handler_fn(move |dispatcher, frame| {
            let (running, peak) = (Arc::clone(&r), Arc::clone(&p));
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                dispatcher.send_response(&json!({ "n": index_of(&frame) })).await.expect("sent");
            }
        });
        let options = DispatcherOptions {
            max_in_flight: 1,
            ..DispatcherOptions::default()
        };
        let (dispatcher, mut client) = pair(&options, handler).await;

        let listener = dispatcher.clone();
        let listen = tokio::spawn(async move { listener.listen_and_respond().await });

        for n in 0..4 {
            client.send(Message::Text(json!({ "n": n }).to_string().into())).await.expect("sent");
        }
        let mut order = Vec::new();
        for _ in 0..4 {
            order.push(read_json(&mut client).await["n"].as_u64().expect("n"));
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(order, vec![0, 1, 2, 3]);

        client.close(None).await.expect("close sent");
        listen.await.expect("listen task").expect("orderly close");
    }

    #[tokio::test]
    async fn test_listen_twice_is_error() {
        let handler = handler_fn(|_, _| async {});
        let (dispatcher, mut client) = pair(&DispatcherOptions::default(), handler).await;

        client.close(None).await.expect("close sent");
        dispatcher.listen_and_respond().await.expect("orderly close");

        let err = dispatcher.listen_and_respond().await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let handler = handler_fn(|_, _| async {});
        let (dispatcher, _client) = pair(&DispatcherOptions::default(), handler).await;

        dispatcher.close().await;
        tokio::time::timeout(Duration::from_millis(100), dispatcher.close())
            .await
            .expect("second close returns immediately");
    }

    #[tokio::test]
    async fn test_write_timeout_breaks_connection() {
        let (server_io, _client_io) = tokio::io::duplex(1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let options = DispatcherOptions {
            write_timeout: Duration::from_millis(50),
            ..DispatcherOptions::default()
        };
        let dispatcher = Dispatcher::from_stream(server, &options, handler_fn(|_, _| async {}));

        let listener = dispatcher.clone();
        let listen = tokio::spawn(async move { listener.listen_and_respond().await });

        // Nobody reads the client side, so the duplex buffer fills up.
        let fill = "x".repeat(256 * 1024);
        let err = dispatcher.send_response(&json!({ "fill": fill })).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(dispatcher.is_broken());

        let ended = tokio::time::timeout(Duration::from_secs(1), listen)
            .await
            .expect("read loop unwinds")
            .expect("listen task");
        assert!(matches!(ended, Err(Error::Connection { .. })));

        let again = dispatcher.send_response(&json!({})).await.unwrap_err();
        assert!(matches!(again, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_accept_routes_by_path() {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(async move {
            Dispatcher::accept(server_io, &DispatcherOptions::default(), |path: &str| {
                (path == "/echo").then(|| {
                    handler_fn(|dispatcher, frame| async move {
                        let text = String::from_utf8_lossy(&frame).into_owned();
                        dispatcher.send_response(&text).await.expect("sent");
                    })
                })
            })
            .await
        });

        let (mut client, response) =
            tokio_tungstenite::client_async("ws://localhost/echo", client_io)
                .await
                .expect("upgrade accepted");
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

        let dispatcher = server.await.expect("accept task").expect("dispatcher");
        let listener = dispatcher.clone();
        let listen = tokio::spawn(async move { listener.listen_and_respond().await });

        client.send(Message::Text("hello".into())).await.expect("sent");
        assert_eq!(read_json(&mut client).await, json!("hello"));

        client.close(None).await.expect("close sent");
        listen.await.expect("listen task").expect("orderly close");
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn test_accept_rejects_unknown_path() {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(async move {
            Dispatcher::accept(server_io, &DispatcherOptions::default(), |_: &str| None).await
        });

        let err = tokio_tungstenite::client_async("ws://localhost/missing", client_io)
            .await
            .unwrap_err();
        match err {
            WsError::Http(response) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
            other => panic!("expected HTTP rejection, got {other}"),
        }

        let accepted = server.await.expect("accept task");
        assert!(matches!(accepted, Err(Error::Handshake { .. })));
    }

    #[tokio::test]
    async fn test_accept_gives_up_on_silent_peer() {
        let (server_io, _client_io) = tokio::io::duplex(1024);
        let options = DispatcherOptions {
            handshake_timeout: Duration::from_millis(50),
            ..DispatcherOptions::default()
        };

        let accepted = timeout(
            Duration::from_secs(2),
            Dispatcher::accept(server_io, &options, |_: &str| None),
        )
        .await
        .expect("handshake deadline applies");

        let err = accepted.err().expect("silent peer is rejected");
        assert!(matches!(err, Error::Handshake { .. }));
        assert!(err.to_string().contains("no upgrade within 50 ms"));
    }
}
