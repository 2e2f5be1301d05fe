//! Listener and session settings.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::transport::DispatcherOptions;

// ============================================================================
// Constants
// ============================================================================

/// Default listen host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

// ============================================================================
// GatewayOptions
// ============================================================================

/// Gateway settings. Build with [`GatewayBuilder`](super::GatewayBuilder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    /// Host or address to listen on.
    pub host: String,

    /// Port to listen on (0 for random).
    pub port: u16,

    /// Limits applied to every session.
    pub dispatcher: DispatcherOptions,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            dispatcher: DispatcherOptions::default(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl GatewayOptions {
    /// Sets the listen host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the listen port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the maximum inbound frame size.
    #[inline]
    #[must_use]
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.dispatcher.max_frame_size = bytes;
        self
    }

    /// Sets the per-write deadline.
    #[inline]
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher.write_timeout = timeout;
        self
    }

    /// Sets the deadline for completing the upgrade handshake.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher.handshake_timeout = timeout;
        self
    }

    /// Sets the per-session handler limit.
    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, handlers: usize) -> Self {
        self.dispatcher.max_in_flight = handlers;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = GatewayOptions::default();
        assert_eq!(options.host, "127.0.0.1");
        assert_eq!(options.port, 8080);
        assert_eq!(options.dispatcher, DispatcherOptions::default());
    }

    #[test]
    fn test_builder_chain() {
        let options = GatewayOptions::default()
            .with_host("0.0.0.0")
            .with_port(0)
            .with_max_frame_size(1024)
            .with_write_timeout(Duration::from_secs(1))
            .with_max_in_flight(8)
            .with_handshake_timeout(Duration::from_secs(2));

        assert_eq!(options.host, "0.0.0.0");
        assert_eq!(options.port, 0);
        assert_eq!(options.dispatcher.max_frame_size, 1024);
        assert_eq!(options.dispatcher.write_timeout, Duration::from_secs(1));
        assert_eq!(options.dispatcher.max_in_flight, 8);
        assert_eq!(options.dispatcher.handshake_timeout, Duration::from_secs(2));
    }
}
