//! Deterministic in-process camera host.
//!
//! Stands in for real camera plumbing in tests and the headless demo. The
//! host can be scripted to fail acquisition with any classified cause, to
//! delay acquisition (so teardown-during-start races are reproducible), and
//! to hold "leaked" handles that no session knows about, the way an
//! unreliable decoding library leaves streams open behind its owner's back.

use crate::{
    report_stray_fault, MediaError, MediaHandleRef, MediaHost, MediaStreamHandle, Result,
    StreamConstraints,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One simulated camera stream.
pub struct SimulatedHandle {
    id: String,
    live: AtomicBool,
    listeners: AtomicU32,
    fail_next_release: AtomicBool,
}

impl SimulatedHandle {
    fn new(id: String) -> Arc<Self> {
        Arc::new(Self {
            id,
            live: AtomicBool::new(true),
            listeners: AtomicU32::new(0),
            fail_next_release: AtomicBool::new(false),
        })
    }

    /// Make the next `release_tracks` call fail while keeping the tracks
    /// held, as a flaky hardware layer would.
    pub fn fail_next_release(&self) {
        self.fail_next_release.store(true, Ordering::SeqCst);
    }

    pub fn released(&self) -> bool {
        !self.live.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> u32 {
        self.listeners.load(Ordering::SeqCst)
    }
}

impl MediaStreamHandle for SimulatedHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn attach_listener(&self) {
        self.listeners.fetch_add(1, Ordering::SeqCst);
    }

    fn detach_listeners(&self) {
        self.listeners.store(0, Ordering::SeqCst);
    }

    fn release_tracks(&self) -> Result<()> {
        if self.fail_next_release.swap(false, Ordering::SeqCst) {
            return Err(MediaError::Other(format!(
                "track stop rejected ({})",
                self.id
            )));
        }

        if !self.live.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // A forced release with listeners still bound surfaces an async
        // hardware error, exactly like real track teardown.
        if self.listeners.swap(0, Ordering::SeqCst) > 0 {
            report_stray_fault(
                "camera",
                &format!("video track ended unexpectedly ({})", self.id),
            );
        }

        tracing::debug!(handle = %self.id, "simulated tracks released");
        Ok(())
    }
}

struct HostState {
    handles: Vec<Arc<SimulatedHandle>>,
    fail_next: Option<MediaError>,
    acquire_delay: Duration,
    next_id: u32,
}

/// Scriptable [`MediaHost`].
pub struct SimulatedHost {
    state: Mutex<HostState>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState {
                handles: Vec::new(),
                fail_next: None,
                acquire_delay: Duration::ZERO,
                next_id: 0,
            }),
        }
    }

    /// Fail the next acquisition with `err`.
    pub fn fail_next_acquire(&self, err: MediaError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    /// Delay every acquisition, making start/teardown races reproducible.
    pub fn set_acquire_delay(&self, delay: Duration) {
        self.state.lock().unwrap().acquire_delay = delay;
    }

    /// Open a live handle that is never handed to any session, as a leaky
    /// decoding library would. Only the last-resort sweep can find it.
    pub fn leak_handle(&self) -> Arc<SimulatedHandle> {
        let mut state = self.state.lock().unwrap();
        let handle = SimulatedHandle::new(format!("cam-{}", state.next_id));
        state.next_id += 1;
        state.handles.push(Arc::clone(&handle));
        handle
    }

    /// Every handle this host ever opened, live or not.
    pub fn handles(&self) -> Vec<Arc<SimulatedHandle>> {
        self.state.lock().unwrap().handles.clone()
    }

    fn open_handle(&self) -> Arc<SimulatedHandle> {
        let mut state = self.state.lock().unwrap();
        let handle = SimulatedHandle::new(format!("cam-{}", state.next_id));
        state.next_id += 1;
        state.handles.push(Arc::clone(&handle));
        handle
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MediaHost for SimulatedHost {
    async fn acquire(&self, _constraints: &StreamConstraints) -> Result<MediaHandleRef> {
        let (delay, fail) = {
            let mut state = self.state.lock().unwrap();
            (state.acquire_delay, state.fail_next.take())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = fail {
            tracing::debug!(error = %err, "simulated acquisition failure");
            return Err(err);
        }

        let handle = self.open_handle();
        tracing::debug!(handle = %handle.id, "simulated camera acquired");
        Ok(handle)
    }

    fn live_handles(&self) -> Vec<MediaHandleRef> {
        self.state
            .lock()
            .unwrap()
            .handles
            .iter()
            .filter(|h| h.is_live())
            .map(|h| Arc::clone(h) as MediaHandleRef)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let host = SimulatedHost::new();
        let handle = host.acquire(&StreamConstraints::default()).await.unwrap();

        assert!(handle.is_live());
        assert_eq!(host.live_handles().len(), 1);

        handle.release_tracks().unwrap();
        assert!(!handle.is_live());
        assert!(host.live_handles().is_empty());
    }

    #[tokio::test]
    async fn test_scripted_failure_consumed_once() {
        let host = SimulatedHost::new();
        host.fail_next_acquire(MediaError::DeviceBusy);

        let first = host.acquire(&StreamConstraints::default()).await;
        assert_eq!(first.unwrap_err(), MediaError::DeviceBusy);

        let second = host.acquire(&StreamConstraints::default()).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_leaked_handle_only_visible_to_sweep() {
        let host = SimulatedHost::new();
        let leaked = host.leak_handle();

        let live = host.live_handles();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id(), leaked.id());
    }

    #[test]
    fn test_failed_release_keeps_tracks_held() {
        let handle = SimulatedHandle::new("cam-x".into());
        handle.fail_next_release();

        assert!(handle.release_tracks().is_err());
        assert!(handle.is_live());

        handle.release_tracks().unwrap();
        assert!(handle.released());
    }
}
