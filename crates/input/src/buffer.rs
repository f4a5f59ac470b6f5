//! Keystroke accumulation for the manual entry field.

use std::time::{Duration, Instant};

/// Inter-key gap below which a run of keystrokes reads as a scanner burst
/// rather than hand typing. Telemetry only; submission never depends on it.
const BURST_GAP: Duration = Duration::from_millis(30);

/// Keystrokes needed before a run counts as a burst.
const BURST_MIN_CHARS: u32 = 4;

/// One keystroke as the entry field sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    /// Submits the buffered text; the manual equivalent of a decode tick.
    Enter,
    /// Clears the buffer.
    Escape,
}

/// Buffers keystrokes until Enter submits them.
///
/// Plain typing never triggers anything; only Enter with buffered text
/// produces a submission.
#[derive(Debug, Default)]
pub struct EntryBuffer {
    text: String,
    last_key_at: Option<Instant>,
    burst_run: u32,
}

impl EntryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one keystroke. Returns the submitted text on Enter with a
    /// non-empty buffer; `None` otherwise.
    pub fn on_key(&mut self, key: Key) -> Option<String> {
        match key {
            Key::Char(c) => {
                self.track_burst();
                self.text.push(c);
                None
            }
            Key::Escape => {
                self.text.clear();
                self.burst_run = 0;
                None
            }
            Key::Enter => {
                self.burst_run = 0;
                let submitted = std::mem::take(&mut self.text);
                let submitted = submitted.trim();
                if submitted.is_empty() {
                    None
                } else {
                    Some(submitted.to_string())
                }
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn track_burst(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_key_at {
            if now.duration_since(last) < BURST_GAP {
                self.burst_run += 1;
                if self.burst_run == BURST_MIN_CHARS {
                    tracing::debug!("wedge-scanner keystroke burst detected");
                }
            } else {
                self.burst_run = 0;
            }
        }
        self.last_key_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(buffer: &mut EntryBuffer, text: &str) {
        for c in text.chars() {
            assert_eq!(buffer.on_key(Key::Char(c)), None);
        }
    }

    #[test]
    fn test_typing_never_submits() {
        let mut buffer = EntryBuffer::new();
        type_text(&mut buffer, "BK-001");
        assert_eq!(buffer.text(), "BK-001");
    }

    #[test]
    fn test_enter_submits_buffered_text() {
        let mut buffer = EntryBuffer::new();
        type_text(&mut buffer, "BK-001");

        assert_eq!(buffer.on_key(Key::Enter), Some("BK-001".to_string()));
        assert_eq!(buffer.text(), "");
    }

    #[test]
    fn test_enter_with_empty_buffer_is_not_an_event() {
        let mut buffer = EntryBuffer::new();
        assert_eq!(buffer.on_key(Key::Enter), None);
    }

    #[test]
    fn test_whitespace_only_submission_is_dropped() {
        let mut buffer = EntryBuffer::new();
        type_text(&mut buffer, "   ");
        assert_eq!(buffer.on_key(Key::Enter), None);
    }

    #[test]
    fn test_submission_is_trimmed() {
        let mut buffer = EntryBuffer::new();
        type_text(&mut buffer, "  BK-002 ");
        assert_eq!(buffer.on_key(Key::Enter), Some("BK-002".to_string()));
    }

    #[test]
    fn test_escape_clears_the_buffer() {
        let mut buffer = EntryBuffer::new();
        type_text(&mut buffer, "BK-003");
        buffer.on_key(Key::Escape);
        assert_eq!(buffer.on_key(Key::Enter), None);
    }
}
