//! Code decoder seam.
//!
//! The image-decoding routine that turns camera frames into text is an
//! external dependency, and a badly behaved one: every one of its lifecycle
//! calls can reject even when its logical state looks fine, and its stop
//! routine is known to leave camera tracks open. The session manager only
//! ever talks to it through the [`CodeDecoder`] trait so that nothing above
//! this seam has to trust it.

mod scripted;

pub use scripted::ScriptedDecoder;

use circ_media::MediaHandleRef;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("decoder start failed: {0}")]
    Start(String),
    #[error("decoder pause failed: {0}")]
    Pause(String),
    #[error("decoder resume failed: {0}")]
    Resume(String),
    #[error("decoder stop failed: {0}")]
    Stop(String),
    #[error("decoder clear failed: {0}")]
    Clear(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// One sampling tick from the running decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeTick {
    /// A code was decoded out of the current frame.
    Decoded(String),
    /// The frame was sampled and nothing was visible. Not an event; the
    /// gate ignores it entirely.
    NoCode,
}

/// Channel the decoder delivers ticks into.
pub type DecodeSink = tokio::sync::mpsc::Sender<DecodeTick>;

/// Sampling configuration for a decoder run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecoderConfig {
    /// Frames sampled per second.
    pub fps: u32,
    /// Optional scan box, width x height, centered in the frame.
    #[serde(default)]
    pub scan_box: Option<(u32, u32)>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            scan_box: Some((250, 250)),
        }
    }
}

/// Lifecycle of the external decoding library.
///
/// All five calls may fail regardless of apparent state; callers on the
/// teardown path must wrap every one of them so a rejection never escapes.
#[async_trait::async_trait]
pub trait CodeDecoder: Send + Sync {
    /// Start sampling `stream`, delivering ticks into `sink`.
    async fn start(
        &self,
        stream: MediaHandleRef,
        config: DecoderConfig,
        sink: DecodeSink,
    ) -> Result<()>;

    /// Suspend frame sampling. `resume_later` hints that the caller intends
    /// to resume rather than stop.
    async fn pause(&self, resume_later: bool) -> Result<()>;

    /// Resume frame sampling after a pause.
    async fn resume(&self) -> Result<()>;

    /// Stop sampling and release whatever the library thinks it holds.
    async fn stop(&self) -> Result<()>;

    /// Tear down the library's render target state.
    async fn clear(&self) -> Result<()>;
}

pub type CodeDecoderRef = Arc<dyn CodeDecoder>;
