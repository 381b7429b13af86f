//! Signal handling: SIGTERM/SIGINT graceful shutdown for the collector.
//!
//! Uses the `signal-hook` crate for safe signal registration. The CLI loop
//! polls `SignalHandler` flags rather than blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Thread-safe signal state shared between the signal handler and the
/// foreground loop.
///
/// The flag uses `Ordering::Relaxed` because the loop polls it every
/// iteration and exact ordering with other atomics is not required.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a new handler and register OS signal hooks.
    ///
    /// SIGTERM/SIGINT -> shutdown. Registration is best-effort; failures are
    /// logged to stderr but not fatal.
    #[must_use]
    pub fn new() -> Self {
        let handler = Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        };
        handler.register_signals();
        handler
    }

    /// Check whether a shutdown has been requested.
    #[must_use]
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Programmatically request shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[TQH-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[TQH-SIGNAL] failed to register SIGINT: {e}");
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmatic_shutdown_request() {
        let handler = SignalHandler::new();
        assert!(!handler.should_shutdown());
        handler.request_shutdown();
        assert!(handler.should_shutdown());
    }

    #[test]
    fn clones_share_state() {
        let handler = SignalHandler::new();
        let clone = handler.clone();
        clone.request_shutdown();
        assert!(handler.should_shutdown());
    }
}
