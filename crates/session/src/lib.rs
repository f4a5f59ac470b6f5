//! Scan session manager.
//!
//! Owns the camera end to end: acquisition with classified failures,
//! pause/resume around in-flight lookups, and a teardown sequence that
//! assumes the decoding library lies about what it has released. The
//! embedding console opens a session with a fixed intent, consumes events
//! off the bus, and closes it; everything between is driven here.

mod manager;
mod state;
mod teardown;

pub use manager::{ScanSessionManager, SessionHandle};
pub use state::SessionState;

use circ_decode::DecoderConfig;
use circ_media::StreamConstraints;
use std::time::Duration;

/// Tuning for one scan session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub constraints: StreamConstraints,
    pub decoder: DecoderConfig,
    /// Close the session on a dispatch rejection instead of clearing the
    /// gate and resuming. Off by default: a wrong-status scan should not
    /// cost the user a camera restart.
    pub close_on_rejection: bool,
    /// How long to keep the camera paused after a lookup transport failure
    /// before scanning resumes.
    pub lookup_retry_delay: Duration,
    /// Minimum spacing between distinct forwarded codes; zero disables.
    pub gate_min_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            constraints: StreamConstraints::default(),
            decoder: DecoderConfig::default(),
            close_on_rejection: false,
            lookup_retry_delay: Duration::from_millis(1500),
            gate_min_interval: Duration::ZERO,
        }
    }
}
