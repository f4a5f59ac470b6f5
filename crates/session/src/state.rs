/// Lifecycle of one scan session.
///
/// `Starting` and `Active` can fall to `Error` on acquisition failure; any
/// state can reach `Closed` on explicit cancel. `Error` and `Closed` are
/// terminal; a retry is a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Hardware acquisition in flight.
    Starting,
    /// Decoder running, gate accepting events.
    Active,
    /// Sampling paused, one lookup in flight.
    Processing,
    Error,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Processing => "processing",
            Self::Error => "error",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::Closed)
    }
}
