//! Camera hardware abstraction for scan sessions.
//!
//! The session manager owns the camera through the [`MediaHost`] and
//! [`MediaStreamHandle`] seams defined here. Two properties drive the shape
//! of these traits:
//!
//! - acquisition failures must be classified (busy / permission / missing)
//!   so the console can show a specific remediation message, and
//! - the host must be able to enumerate *every* live handle in the process,
//!   because the decoding library's own bookkeeping cannot be trusted to
//!   know which streams are still open at teardown time.

mod fault;
mod simulated;

pub use fault::{drain_stray_faults, install_noise_filter, report_stray_fault, NoiseFilterGuard, StrayFault};
pub use simulated::{SimulatedHandle, SimulatedHost};

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("camera is in use by another application")]
    DeviceBusy,
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera device found")]
    DeviceNotFound,
    #[error("camera error: {0}")]
    Other(String),
}

impl MediaError {
    /// Short machine-readable cause, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceBusy => "busy",
            Self::PermissionDenied => "permission",
            Self::DeviceNotFound => "not_found",
            Self::Other(_) => "other",
        }
    }

    /// User-facing remediation message. Each classified cause reads
    /// differently so the console can tell the user what to actually do.
    pub fn user_message(&self) -> String {
        match self {
            Self::DeviceBusy => {
                "The camera is already in use by another application. \
                 Close it and try again."
                    .to_string()
            }
            Self::PermissionDenied => {
                "Camera access was denied. Allow camera access in your \
                 system settings and try again."
                    .to_string()
            }
            Self::DeviceNotFound => {
                "No camera was found on this device. Connect a camera or \
                 use manual entry."
                    .to_string()
            }
            Self::Other(_) => "The camera could not be started.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;

/// Which camera to prefer when more than one is present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera; the sensible default for scanning codes off a desk.
    #[default]
    Environment,
    User,
}

/// Acquisition constraints passed to [`MediaHost::acquire`].
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    /// Optional frame size hint, width x height.
    #[serde(default)]
    pub frame_hint: Option<(u32, u32)>,
}

/// One acquired camera stream.
///
/// Handles are exclusively owned by the session that acquired them, but the
/// trait deliberately exposes enough to let teardown release a handle it did
/// not acquire itself (the last-resort sweep).
pub trait MediaStreamHandle: Send + Sync {
    fn id(&self) -> &str;

    /// Whether any track of this stream is still held.
    fn is_live(&self) -> bool;

    /// Register interest in hardware-level track events. Called by the
    /// decoder when it starts consuming the stream.
    fn attach_listener(&self);

    /// Drop all track event listeners. Must be called before a forced
    /// release so the release does not surface spurious hardware errors.
    fn detach_listeners(&self);

    /// Stop and release every track of this stream.
    fn release_tracks(&self) -> Result<()>;
}

impl std::fmt::Debug for dyn MediaStreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStreamHandle")
            .field("id", &self.id())
            .field("is_live", &self.is_live())
            .finish()
    }
}

pub type MediaHandleRef = Arc<dyn MediaStreamHandle>;

/// Access to the process's camera devices.
#[async_trait::async_trait]
pub trait MediaHost: Send + Sync {
    /// Request camera access. Suspends for the platform permission prompt
    /// and device startup; fails with a classified [`MediaError`].
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<MediaHandleRef>;

    /// Every handle of this resource type currently live in the process,
    /// whether or not this host handed it out through [`Self::acquire`].
    fn live_handles(&self) -> Vec<MediaHandleRef>;
}

pub type MediaHostRef = Arc<dyn MediaHost>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_causes_have_distinct_messages() {
        let busy = MediaError::DeviceBusy.user_message();
        let denied = MediaError::PermissionDenied.user_message();
        let missing = MediaError::DeviceNotFound.user_message();

        assert_ne!(busy, denied);
        assert_ne!(busy, missing);
        assert_ne!(denied, missing);
    }

    #[test]
    fn test_unclassified_falls_back_to_generic() {
        let err = MediaError::Other("ConstraintNotSatisfiedError".into());
        assert_eq!(err.kind(), "other");
        assert_eq!(err.user_message(), "The camera could not be started.");
    }
}
