//! Forced teardown of the camera resource.
//!
//! The decoding library's stop routine cannot be trusted: it rejects when
//! its bookkeeping disagrees with reality and it leaves tracks open. So the
//! sequence here never relies on a single source of truth for "is the
//! camera off": ask the library first, release the handle we know about
//! second, then sweep every live handle in the process. Each step is
//! independently best-effort; a failure is logged and the next step runs.

use crate::manager::SessionCtx;
use circ_media::MediaHandleRef;

/// Error signatures the hardware/decoder layer is known to raise as a side
/// effect of forced release. A session-scoped noise filter swallows exactly
/// these; anything else is a real fault and propagates.
const TEARDOWN_NOISE: &[&str] = &["track ended unexpectedly", "decoder stream interrupted"];

pub(crate) fn noise_signatures() -> Vec<String> {
    TEARDOWN_NOISE.iter().map(|s| s.to_string()).collect()
}

/// Run the full teardown sequence. Infallible by construction.
pub(crate) async fn run(ctx: &SessionCtx, handle: Option<MediaHandleRef>) {
    // (1) the library's own lifecycle, every call wrapped
    if let Err(e) = ctx.decoder.pause(false).await {
        tracing::debug!(session = %ctx.id, error = %e, "decoder pause rejected during teardown");
    }
    if let Err(e) = ctx.decoder.stop().await {
        tracing::warn!(session = %ctx.id, error = %e, "decoder stop rejected during teardown");
    }
    if let Err(e) = ctx.decoder.clear().await {
        tracing::warn!(session = %ctx.id, error = %e, "decoder clear rejected during teardown");
    }

    // (2) direct release of the handle this session owns. Listeners come
    // off first; a forced release with listeners still bound raises stray
    // hardware errors after the fact.
    if let Some(handle) = &handle {
        handle.detach_listeners();
        if let Err(e) = handle.release_tracks() {
            tracing::warn!(
                session = %ctx.id,
                handle = %handle.id(),
                error = %e,
                "direct track release failed; the sweep will retry"
            );
        }
    }

    // (3) last-resort sweep. The library may have opened streams this
    // session never learned about; release everything still live. A handle
    // released here is leak telemetry, not business as usual.
    let mut swept = 0u32;
    for stray in ctx.host.live_handles() {
        match stray.release_tracks() {
            Ok(()) => {
                swept += 1;
                tracing::warn!(
                    session = %ctx.id,
                    handle = %stray.id(),
                    "live camera handle released by teardown sweep"
                );
            }
            Err(e) => {
                tracing::warn!(
                    session = %ctx.id,
                    handle = %stray.id(),
                    error = %e,
                    "teardown sweep could not release handle"
                );
            }
        }
    }

    if swept == 0 {
        tracing::debug!(session = %ctx.id, "teardown complete, no leaked handles");
    }
}
