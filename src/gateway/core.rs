//! Listener and session supervisor.
//!
//! [`Gateway`] binds the TCP listener and runs the accept loop. Every
//! accepted connection is upgraded by a [`Dispatcher`] in its own task and
//! served until the client goes away.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::handler::GenerationHandler;
use crate::registry::Registry;
use crate::transport::{Dispatcher, InFlight, PendingGuard, RequestHandler};

use super::builder::GatewayBuilder;
use super::options::GatewayOptions;
use super::routes::Route;

// ============================================================================
// Types
// ============================================================================

/// Shared state for the gateway.
struct GatewayInner {
    /// Aliases and pipelines.
    registry: Arc<Registry>,
    /// Settings the gateway was built with.
    options: GatewayOptions,
    /// Address actually bound.
    local_addr: SocketAddr,
    /// Open sessions.
    sessions: Arc<InFlight>,
    /// Shutdown flag.
    shutdown: AtomicBool,
    /// Wakes the accept loop on shutdown.
    shutdown_signal: Notify,
    /// Accept loop task, taken on shutdown.
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// Gateway
// ============================================================================

/// Running WebSocket gateway.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use tilegate::Gateway;
/// use tilegate::backend::LocalBackend;
///
/// # async fn example() -> tilegate::Result<()> {
/// let gateway = Gateway::builder()
///     .port(0)
///     .pipeline("heat", Arc::new(LocalBackend::new(LocalBackend::store_pool())))
///     .bind()
///     .await?;
///
/// println!("listening on {}", gateway.local_addr());
/// gateway.shutdown(Duration::from_secs(5)).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Binds the listener and starts the accept loop.
    pub(crate) async fn bind(registry: Registry, options: GatewayOptions) -> Result<Self> {
        let listener = TcpListener::bind((options.host.as_str(), options.port)).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, ?registry, "Gateway listener bound");

        let inner = Arc::new(GatewayInner {
            registry: Arc::new(registry),
            options,
            local_addr,
            sessions: InFlight::new(),
            shutdown: AtomicBool::new(false),
            shutdown_signal: Notify::new(),
            accept_task: Mutex::new(None),
        });

        let task = tokio::spawn(Arc::clone(&inner).accept_loop(listener));
        *inner.accept_task.lock() = Some(task);

        info!(%local_addr, "Gateway started");

        Ok(Self { inner })
    }

    /// Returns the address the listener is bound to.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Returns the WebSocket URL for `route`.
    #[must_use]
    pub fn ws_url(&self, route: &Route) -> String {
        format!("ws://{}{}", self.inner.local_addr, route.path())
    }

    /// Returns the number of open sessions.
    #[inline]
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.count()
    }

    /// Returns the registry shared by all sessions.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Stops accepting and waits up to `grace` for open sessions to end.
    ///
    /// Returns the number of sessions still open when the wait ended.
    /// Calling it again only repeats the wait.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        if !self.inner.shutdown.swap(true, Ordering::AcqRel) {
            info!("Gateway shutting down");
            self.inner.shutdown_signal.notify_one();
        }

        let task = self.inner.accept_task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(error = %e, "Accept loop failed");
        }

        if timeout(grace, self.inner.sessions.wait_idle()).await.is_err() {
            warn!(open = self.active_sessions(), "Sessions still open after grace period");
        }

        let open = self.active_sessions();
        info!(open, "Gateway shutdown complete");
        open
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("local_addr", &self.inner.local_addr)
            .field("active_sessions", &self.active_sessions())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// GatewayInner - Accept Loop
// ============================================================================

impl GatewayInner {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            let accepted = tokio::select! {
                () = self.shutdown_signal.notified() => continue,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    let session = self.sessions.enter();
                    let gateway = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = gateway.serve(stream, addr, session).await {
                            warn!(error = %e, %addr, "Session setup failed");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                }
            }
        }

        debug!("Accept loop terminated");
    }

    /// Upgrades one connection and serves it to completion.
    ///
    /// `_session` is taken before the task is spawned and released when
    /// the task ends, so shutdown counts sessions still in setup.
    async fn serve(
        self: Arc<Self>,
        stream: TcpStream,
        addr: SocketAddr,
        _session: PendingGuard,
    ) -> Result<()> {
        debug!(%addr, "New TCP connection");

        let router = {
            let gateway = Arc::clone(&self);
            move |path: &str| gateway.handler_for(path)
        };
        let dispatcher = Dispatcher::accept(stream, &self.options.dispatcher, router).await?;
        let id = dispatcher.id();

        info!(%id, %addr, "Session started");

        let result = dispatcher.listen_and_respond().await;
        dispatcher.close().await;

        match result {
            Ok(()) => info!(%id, %addr, "Session ended"),
            Err(e) => warn!(%id, %addr, error = %e, "Session ended abnormally"),
        }
        Ok(())
    }

    /// Picks the handler for an upgrade path.
    fn handler_for(&self, path: &str) -> Option<Arc<dyn RequestHandler>> {
        let route = Route::parse(path)?;

        let (name, backend) = match self.registry.pipeline(route.pipeline.as_deref()) {
            Ok(found) => found,
            Err(e) => {
                debug!(path, error = %e, "No pipeline for route");
                return None;
            }
        };

        let handler = GenerationHandler::new(
            route.kind,
            name,
            backend,
            Arc::clone(self.registry.aliases()),
        );
        Some(Arc::new(handler))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::backend::LocalBackend;
    use crate::protocol::RequestKind;

    async fn gateway() -> Gateway {
        Gateway::builder()
            .port(0)
            .pipeline("heat", Arc::new(LocalBackend::new(LocalBackend::store_pool())))
            .bind()
            .await
            .expect("gateway binds")
    }

    #[tokio::test]
    async fn test_bind_random_port() {
        let gateway = gateway().await;
        assert!(gateway.local_addr().port() > 0);
        assert_eq!(gateway.active_sessions(), 0);
        gateway.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_ws_url_format() {
        let gateway = gateway().await;
        let url = gateway.ws_url(&Route::named(RequestKind::Tile, "heat"));
        assert_eq!(url, format!("ws://{}/ws/tile/heat", gateway.local_addr()));
        gateway.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_handler_for_routes() {
        let gateway = gateway().await;
        let inner = &gateway.inner;

        assert!(inner.handler_for("/tile-dispatch").is_some());
        assert!(inner.handler_for("/ws/meta/heat").is_some());
        assert!(inner.handler_for("/ws/tile/count").is_none());
        assert!(inner.handler_for("/nope").is_none());
        assert!(inner.handler_for("/tile/heat").is_none());

        gateway.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let gateway = gateway().await;
        let addr = gateway.local_addr();

        let open = gateway.shutdown(Duration::from_millis(100)).await;
        assert_eq!(open, 0);
        assert!(TcpStream::connect(addr).await.is_err());

        // Second call is harmless.
        assert_eq!(gateway.shutdown(Duration::from_millis(10)).await, 0);
    }
    #[tokio::test]
    async fn test_shutdown_counts_session_in_setup() {
        let gateway = Gateway::builder()
            .port(0)
            .handshake_timeout(Duration::from_millis(300))
            .pipeline("heat", Arc::new(LocalBackend::new(LocalBackend::store_pool())))
            .bind()
            .await
            .expect("gateway binds");

        // Connected but never sends the upgrade request.
        let _silent = TcpStream::connect(gateway.local_addr()).await.expect("connects");
        timeout(Duration::from_secs(2), async {
            while gateway.active_sessions() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session registered");

        assert_eq!(gateway.shutdown(Duration::from_millis(50)).await, 1);

        // The handshake deadline ends the session.
        assert_eq!(gateway.shutdown(Duration::from_secs(2)).await, 0);
    }
}
