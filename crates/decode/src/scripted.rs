//! Scriptable decoder for tests and the headless demo.
//!
//! Reproduces the failure modes of the real decoding library on demand:
//! lifecycle calls that reject, and a stop routine that "succeeds" without
//! actually releasing anything (the leak is modeled on the host side via
//! `SimulatedHost::leak_handle`).

use crate::{CodeDecoder, DecodeError, DecodeSink, DecodeTick, DecoderConfig, Result};
use circ_media::MediaHandleRef;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct ScriptState {
    sink: Option<DecodeSink>,
    stream: Option<MediaHandleRef>,
    fail_start: Option<DecodeError>,
    calls: Vec<&'static str>,
}

/// Decoder whose tick feed and failures are driven by the test.
#[derive(Default)]
pub struct ScriptedDecoder {
    state: Mutex<ScriptState>,
    running: AtomicBool,
    paused: AtomicBool,
    fail_stop: AtomicBool,
    fail_clear: AtomicBool,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `start` call with `err`.
    pub fn fail_next_start(&self, err: DecodeError) {
        self.state.lock().unwrap().fail_start = Some(err);
    }

    /// Make `stop` reject, as the real library does when its internal
    /// bookkeeping disagrees with reality.
    pub fn fail_stop(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }

    /// Make `clear` reject.
    pub fn fail_clear(&self) {
        self.fail_clear.store(true, Ordering::SeqCst);
    }

    /// Push one sampling tick into the running decoder.
    ///
    /// Returns true when the tick was delivered; paused or stopped decoders
    /// sample no frames, so the tick is dropped and false returned.
    pub fn push(&self, tick: DecodeTick) -> bool {
        if !self.running.load(Ordering::SeqCst) || self.paused.load(Ordering::SeqCst) {
            return false;
        }
        let state = self.state.lock().unwrap();
        match &state.sink {
            Some(sink) => sink.try_send(tick).is_ok(),
            None => false,
        }
    }

    /// Lifecycle calls observed so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn record(&self, call: &'static str) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait::async_trait]
impl CodeDecoder for ScriptedDecoder {
    async fn start(
        &self,
        stream: MediaHandleRef,
        config: DecoderConfig,
        sink: DecodeSink,
    ) -> Result<()> {
        self.record("start");

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_start.take() {
            return Err(err);
        }

        stream.attach_listener();
        tracing::debug!(stream = %stream.id(), fps = config.fps, "scripted decoder started");

        state.sink = Some(sink);
        state.stream = Some(stream);
        drop(state);

        self.running.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self, resume_later: bool) -> Result<()> {
        self.record("pause");
        if !self.running.load(Ordering::SeqCst) {
            return Err(DecodeError::Pause("scanner is not running".into()));
        }
        tracing::trace!(resume_later, "scripted decoder paused");
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record("resume");
        if !self.running.load(Ordering::SeqCst) {
            return Err(DecodeError::Resume("scanner is not running".into()));
        }
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop");
        if self.fail_stop.swap(false, Ordering::SeqCst) {
            return Err(DecodeError::Stop(
                "scanner is not running or paused".into(),
            ));
        }
        self.running.store(false, Ordering::SeqCst);
        self.state.lock().unwrap().sink = None;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.record("clear");
        if self.fail_clear.swap(false, Ordering::SeqCst) {
            return Err(DecodeError::Clear("render target already detached".into()));
        }
        self.state.lock().unwrap().stream = None;
        Ok(())
    }
}
