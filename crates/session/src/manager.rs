//! Session orchestration: open, event loop, close.

use crate::{teardown, SessionConfig, SessionState};
use circ_decode::{CodeDecoderRef, DecodeTick};
use circ_dispatch::{DispatchOutcome, DispatchReport, Dispatcher, ScanIntent};
use circ_events::{
    event_names, now_ms, AcquisitionFailedEvent, CodeAcceptedEvent, EventBusRef, LookupRetryEvent,
    PaymentDueEvent, ReturnCommittedEvent, ReturnFailedEvent, ScanResolvedEvent,
    SessionClosedEvent, SessionStartedEvent,
};
use circ_gate::ScanGate;
use circ_lookup::{CirculationApiRef, LookupClientRef};
use circ_media::{MediaError, MediaHandleRef, MediaHostRef};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Decode ticks buffered between the decoder and the session loop.
const TICK_CHANNEL_CAPACITY: usize = 32;

/// What a resolved scan attempt means for the session's lifetime.
enum Disposition {
    Close,
    Resume,
}

enum Resolution {
    /// Lookup never produced a usable answer; resume scanning after the
    /// configured delay rather than closing.
    Retry { error: String },
    Report(DispatchReport),
}

/// Hooks into a still-open predecessor session: cancel it and watch it
/// reach a terminal state before the camera is touched again.
struct PriorSession {
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
}

/// Builds and opens scan sessions over a fixed set of collaborators.
pub struct ScanSessionManager {
    host: MediaHostRef,
    decoder: CodeDecoderRef,
    lookup: LookupClientRef,
    dispatcher: Arc<Dispatcher>,
    bus: EventBusRef,
    config: SessionConfig,
    active: Mutex<Option<PriorSession>>,
}

impl ScanSessionManager {
    pub fn new(
        host: MediaHostRef,
        decoder: CodeDecoderRef,
        lookup: LookupClientRef,
        api: CirculationApiRef,
        bus: EventBusRef,
    ) -> Self {
        Self {
            host,
            decoder,
            lookup,
            dispatcher: Arc::new(Dispatcher::new(api)),
            bus,
            config: SessionConfig::default(),
            active: Mutex::new(None),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Open a session with `intent` fixed for its lifetime.
    ///
    /// Returns immediately; acquisition and everything after it run on the
    /// session task and report through the event bus.
    pub fn open(&self, intent: ScanIntent) -> SessionHandle {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let ctx = SessionCtx {
            id,
            intent,
            host: Arc::clone(&self.host),
            decoder: Arc::clone(&self.decoder),
            lookup: Arc::clone(&self.lookup),
            dispatcher: Arc::clone(&self.dispatcher),
            bus: Arc::clone(&self.bus),
            config: self.config.clone(),
            cancel: cancel.clone(),
            state: state_tx,
        };

        // One session holds the camera at a time: a still-open predecessor
        // is cancelled and fully released before this one acquires.
        let prior = self.active.lock().unwrap().replace(PriorSession {
            cancel: cancel.clone(),
            state: state_rx.clone(),
        });

        tracing::info!(session = %id, %intent, "scan session opening");
        let join = tokio::spawn(run_session(ctx, prior));

        SessionHandle {
            id,
            cancel,
            state: state_rx,
            join: Mutex::new(Some(join)),
        }
    }
}

/// The embedding console's grip on a running session.
pub struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
    join: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Request close. Unconditional and idempotent: safe while acquisition
    /// or a lookup is still pending, and safe to call any number of times.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Wait until the session reaches `target`.
    ///
    /// Returns false if it reached a terminal state instead.
    pub async fn wait_for(&self, target: SessionState) -> bool {
        let mut rx = self.state.clone();
        loop {
            let current = *rx.borrow_and_update();
            if current == target {
                return true;
            }
            if current.is_terminal() {
                return false;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow() == target;
            }
        }
    }

    /// Wait for the session task to finish, teardown included.
    pub async fn done(&self) {
        let mut rx = self.state.clone();
        loop {
            if rx.borrow_and_update().is_terminal() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }

        let join = self.join.lock().unwrap().take();
        if let Some(join) = join {
            let _ = join.await;
        }
    }
}

/// Everything the session task needs; cloned out of the manager at open.
pub(crate) struct SessionCtx {
    pub(crate) id: Uuid,
    pub(crate) intent: ScanIntent,
    pub(crate) host: MediaHostRef,
    pub(crate) decoder: CodeDecoderRef,
    pub(crate) lookup: LookupClientRef,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) bus: EventBusRef,
    pub(crate) config: SessionConfig,
    pub(crate) cancel: CancellationToken,
    pub(crate) state: watch::Sender<SessionState>,
}

impl SessionCtx {
    fn set_state(&self, state: SessionState) {
        tracing::debug!(session = %self.id, %state, "session state");
        let _ = self.state.send(state);
    }

    fn emit<T: Serialize>(&self, topic: &str, event: &T) {
        let payload = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        self.bus.emit(topic, payload);
    }

    fn session_id(&self) -> String {
        self.id.to_string()
    }

    fn finish_closed(&self, reason: &str) {
        self.set_state(SessionState::Closed);
        self.emit(
            event_names::SESSION_CLOSED,
            &SessionClosedEvent {
                session_id: self.session_id(),
                reason: reason.to_string(),
                ts_ms: now_ms(),
            },
        );
        tracing::info!(session = %self.id, reason, "scan session closed");
    }

    fn emit_acquisition_failed(&self, err: &MediaError) {
        self.emit(
            event_names::ACQUISITION_FAILED,
            &AcquisitionFailedEvent {
                session_id: self.session_id(),
                kind: err.kind().to_string(),
                message: err.user_message(),
                ts_ms: now_ms(),
            },
        );
    }
}

async fn run_session(ctx: SessionCtx, prior: Option<PriorSession>) {
    // Forced release raises async noise from the hardware layer for as long
    // as this session might force-release anything; filter it for exactly
    // that window.
    let _noise_filter = circ_media::install_noise_filter(teardown::noise_signatures());

    if let Some(prior) = prior {
        prior.cancel.cancel();
        let mut state = prior.state;
        while !state.borrow_and_update().is_terminal() {
            if state.changed().await.is_err() {
                break;
            }
        }
        tracing::debug!(session = %ctx.id, "predecessor session released the camera");
    }

    ctx.set_state(SessionState::Starting);
    let acquired = ctx.host.acquire(&ctx.config.constraints).await;

    // Teardown has priority over a pending acquisition, but the acquisition
    // was allowed to settle first: whatever it produced gets released, never
    // orphaned.
    if ctx.cancel.is_cancelled() {
        teardown::run(&ctx, acquired.ok()).await;
        ctx.finish_closed("cancelled");
        return;
    }

    let handle = match acquired {
        Ok(handle) => handle,
        Err(err) => {
            tracing::warn!(session = %ctx.id, kind = err.kind(), error = %err, "camera acquisition failed");
            ctx.emit_acquisition_failed(&err);
            // Nothing was handed to us, but half-opened streams may exist.
            // Release everything before the terminal state is published.
            teardown::run(&ctx, None).await;
            ctx.set_state(SessionState::Error);
            return;
        }
    };

    let (tick_tx, mut tick_rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);
    if let Err(err) = ctx
        .decoder
        .start(Arc::clone(&handle), ctx.config.decoder.clone(), tick_tx)
        .await
    {
        tracing::warn!(session = %ctx.id, error = %err, "decoder failed to start");
        ctx.emit_acquisition_failed(&MediaError::Other(err.to_string()));
        teardown::run(&ctx, Some(handle)).await;
        ctx.set_state(SessionState::Error);
        return;
    }

    ctx.set_state(SessionState::Active);
    ctx.emit(
        event_names::SESSION_STARTED,
        &SessionStartedEvent {
            session_id: ctx.session_id(),
            intent: ctx.intent.to_string(),
            ts_ms: now_ms(),
        },
    );

    let mut gate = ScanGate::with_min_interval(ctx.config.gate_min_interval);

    loop {
        let tick = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                teardown::run(&ctx, Some(handle)).await;
                ctx.finish_closed("cancelled");
                return;
            }
            tick = tick_rx.recv() => tick,
        };

        let Some(tick) = tick else {
            // The decoder dropped its sink; nothing more will ever arrive.
            tracing::warn!(session = %ctx.id, "decode stream ended outside teardown");
            teardown::run(&ctx, Some(handle)).await;
            ctx.finish_closed("decoder_stopped");
            return;
        };

        let observed = match &tick {
            DecodeTick::Decoded(code) => Some(code.as_str()),
            DecodeTick::NoCode => None,
        };
        let Some(code) = gate.observe(observed) else {
            continue;
        };

        ctx.set_state(SessionState::Processing);
        ctx.emit(
            event_names::CODE_ACCEPTED,
            &CodeAcceptedEvent {
                session_id: Some(ctx.session_id()),
                code: code.clone(),
                ts_ms: now_ms(),
            },
        );

        // Stop sampling before the lookup goes out so the same code is not
        // re-decoded mid-flight. The gate still dedups if the pause call is
        // one of the library's flakes.
        if let Err(err) = ctx.decoder.pause(true).await {
            tracing::warn!(session = %ctx.id, error = %err, "decoder pause rejected; relying on gate dedup");
        }

        // One lookup in flight, at most. Resolution runs on its own task so
        // a teardown request lets it settle while we discard the result.
        let resolving = tokio::spawn(resolve(
            Arc::clone(&ctx.lookup),
            Arc::clone(&ctx.dispatcher),
            ctx.intent,
            code.clone(),
        ));

        let resolution = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                // The spawned resolution settles on its own; no outcome is
                // produced from it.
                teardown::run(&ctx, Some(handle)).await;
                ctx.finish_closed("cancelled");
                return;
            }
            joined = resolving => match joined {
                Ok(resolution) => resolution,
                Err(err) => {
                    tracing::error!(session = %ctx.id, error = %err, "resolution task failed");
                    Resolution::Retry { error: "internal resolution failure".to_string() }
                }
            },
        };

        match resolution {
            Resolution::Retry { error } => {
                ctx.emit(
                    event_names::LOOKUP_RETRY,
                    &LookupRetryEvent {
                        session_id: Some(ctx.session_id()),
                        code: code.clone(),
                        error,
                        retry_delay_ms: ctx.config.lookup_retry_delay.as_millis() as u64,
                        ts_ms: now_ms(),
                    },
                );

                let cancelled = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => true,
                    _ = tokio::time::sleep(ctx.config.lookup_retry_delay) => false,
                };
                if cancelled {
                    teardown::run(&ctx, Some(handle)).await;
                    ctx.finish_closed("cancelled");
                    return;
                }

                gate.reset();
                resume_sampling(&ctx).await;
            }
            Resolution::Report(report) => {
                emit_report(&ctx, &report);

                match disposition(&report, &ctx.config) {
                    Disposition::Close => {
                        teardown::run(&ctx, Some(handle)).await;
                        ctx.finish_closed("resolved");
                        return;
                    }
                    Disposition::Resume => {
                        gate.reset();
                        resume_sampling(&ctx).await;
                    }
                }
            }
        }
    }
}

async fn resolve(
    lookup: LookupClientRef,
    dispatcher: Arc<Dispatcher>,
    intent: ScanIntent,
    code: String,
) -> Resolution {
    match lookup.lookup(&code).await {
        Ok(result) => Resolution::Report(dispatcher.run(intent, &result).await),
        Err(err) => {
            tracing::warn!(code, error = %err, "lookup failed in transit");
            Resolution::Retry {
                error: err.to_string(),
            }
        }
    }
}

async fn resume_sampling(ctx: &SessionCtx) {
    if let Err(err) = ctx.decoder.resume().await {
        tracing::warn!(session = %ctx.id, error = %err, "decoder resume rejected");
    }
    ctx.set_state(SessionState::Active);
}

fn emit_report(ctx: &SessionCtx, report: &DispatchReport) {
    let outcome = serde_json::to_value(&report.outcome).unwrap_or(serde_json::Value::Null);
    ctx.emit(
        event_names::SCAN_RESOLVED,
        &ScanResolvedEvent {
            session_id: Some(ctx.session_id()),
            code: report.code.clone(),
            decision: report.outcome.decision_label().to_string(),
            outcome,
            ts_ms: now_ms(),
        },
    );

    if let Some(receipt) = &report.receipt {
        ctx.emit(
            event_names::RETURN_COMMITTED,
            &ReturnCommittedEvent {
                session_id: Some(ctx.session_id()),
                code: report.code.clone(),
                penalty_amount: receipt.penalty_amount,
                days_late: receipt.days_late,
                ts_ms: now_ms(),
            },
        );
        if receipt.penalty_amount > 0.0 {
            ctx.emit(
                event_names::PAYMENT_DUE,
                &PaymentDueEvent {
                    session_id: Some(ctx.session_id()),
                    code: report.code.clone(),
                    amount: receipt.penalty_amount,
                    days_late: receipt.days_late,
                    ts_ms: now_ms(),
                },
            );
        }
    }

    if let Some(message) = &report.return_error {
        ctx.emit(
            event_names::RETURN_FAILED,
            &ReturnFailedEvent {
                session_id: Some(ctx.session_id()),
                code: report.code.clone(),
                message: message.clone(),
                ts_ms: now_ms(),
            },
        );
    }
}

/// Close on `Proceed`; stay open to rescan after a not-found; rejections
/// follow configuration.
fn disposition(report: &DispatchReport, config: &SessionConfig) -> Disposition {
    match &report.outcome {
        DispatchOutcome::Proceed(_) => Disposition::Close,
        DispatchOutcome::NotFoundRecovery { .. } => Disposition::Resume,
        DispatchOutcome::Rejected(_) => {
            if config.close_on_rejection {
                Disposition::Close
            } else {
                Disposition::Resume
            }
        }
    }
}
