//! Text delivery into the focused application.
//!
//! The delivery strategy is clipboard-based paste: save whatever is on the
//! clipboard, put the transcript there, synthesize the platform paste
//! chord, then restore the previous contents. The restore runs exactly once
//! per delivery, whether or not the paste succeeded.
//!
//! [`TextSink`] is the seam the pipeline talks to; [`ClipboardTextSink`]
//! implements it over a [`PasteBackend`], which abstracts the actual
//! clipboard and keystroke plumbing so the save/paste/restore protocol is
//! testable without a display server.

pub mod clipboard;
pub mod paste;

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

use crate::config::DeliveryConfig;

pub use clipboard::{PasteBackend, SystemPasteBackend};

// ---------------------------------------------------------------------------
// DeliveryError
// ---------------------------------------------------------------------------

/// Errors from the delivery subsystem. All of them abort the current
/// delivery only; the session's transcript is dropped but the application
/// keeps running.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The system clipboard could not be opened at all.
    #[error("clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    /// Writing the transcript to the clipboard failed.
    #[error("failed to set clipboard text: {0}")]
    ClipboardSet(String),

    /// The synthetic-input backend could not be initialised.
    #[error("paste input backend unavailable: {0}")]
    PasteToolUnavailable(String),

    /// Sending the paste chord failed.
    #[error("failed to send paste keystroke: {0}")]
    PasteFailed(String),
}

// ---------------------------------------------------------------------------
// sanitize_text
// ---------------------------------------------------------------------------

/// Strip control characters from a transcript before it reaches the
/// clipboard, keeping newlines and tabs, and trim surrounding whitespace.
///
/// Transcription engines occasionally emit stray control bytes; pasting
/// those into a terminal can trigger escape sequences.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// TextSink trait
// ---------------------------------------------------------------------------

/// Destination for finished transcripts.
///
/// `deliver` is synchronous and may block briefly (paste delays, clipboard
/// round-trips); the pipeline calls it through `spawn_blocking`. Delivering
/// text that sanitizes to empty is a successful no-op.
pub trait TextSink: Send + Sync {
    fn deliver(&self, text: &str) -> Result<(), DeliveryError>;
}

// ---------------------------------------------------------------------------
// ClipboardTextSink
// ---------------------------------------------------------------------------

/// Clipboard-paste [`TextSink`] over a pluggable [`PasteBackend`].
///
/// The backend sits behind a mutex so concurrent deliveries serialize — two
/// interleaved save/set/paste/restore sequences would corrupt each other's
/// clipboard snapshots.
pub struct ClipboardTextSink<B: PasteBackend> {
    backend: Mutex<B>,
    paste_delay: Duration,
    rdp_paste_delay: Duration,
}

impl ClipboardTextSink<SystemPasteBackend> {
    /// Build the production sink over the real clipboard and keyboard.
    pub fn new(config: &DeliveryConfig) -> Self {
        Self::with_backend(SystemPasteBackend::new(), config)
    }
}

impl<B: PasteBackend> ClipboardTextSink<B> {
    pub fn with_backend(backend: B, config: &DeliveryConfig) -> Self {
        Self {
            backend: Mutex::new(backend),
            paste_delay: Duration::from_millis(config.paste_delay_ms),
            rdp_paste_delay: Duration::from_millis(config.rdp_paste_delay_ms),
        }
    }

    /// Set the clipboard, wait, send the paste chord. Split out so the
    /// caller can run the clipboard restore regardless of which step failed.
    fn set_and_paste(backend: &mut B, text: &str, delay: Duration) -> Result<(), DeliveryError> {
        backend.set_text(text)?;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        backend.send_paste()
    }
}

impl<B: PasteBackend> TextSink for ClipboardTextSink<B> {
    fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let text = sanitize_text(text);
        if text.is_empty() {
            log::debug!("transcript sanitized to empty, nothing to deliver");
            return Ok(());
        }

        let mut backend = self.backend.lock().unwrap();

        // Remote desktop sessions lose synthetic keystrokes that arrive
        // before the clipboard sync completes, so they get a longer delay.
        let delay = if backend.remote_session() {
            log::debug!("remote desktop session detected, using RDP paste delay");
            self.rdp_paste_delay
        } else {
            self.paste_delay
        };

        let previous = backend.snapshot()?;
        let result = Self::set_and_paste(&mut backend, &text, delay);

        if let Err(e) = backend.restore(previous) {
            log::warn!("failed to restore previous clipboard contents: {e}");
        }

        match &result {
            Ok(()) => log::info!("delivered {} chars", text.chars().count()),
            Err(e) => log::warn!("delivery failed: {e}"),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    // ---- sanitize_text -----------------------------------------------------

    #[test]
    fn sanitize_keeps_plain_text() {
        assert_eq!(sanitize_text("hello world"), "hello world");
    }

    #[test]
    fn sanitize_keeps_newlines_and_tabs() {
        assert_eq!(sanitize_text("a\nb\tc"), "a\nb\tc");
    }

    #[test]
    fn sanitize_strips_control_characters() {
        assert_eq!(sanitize_text("a\u{7}b\u{1b}[31mc\r"), "ab[31mc");
    }

    #[test]
    fn sanitize_trims_surrounding_whitespace() {
        assert_eq!(sanitize_text("  padded  "), "padded");
    }

    #[test]
    fn sanitize_whitespace_only_is_empty() {
        assert_eq!(sanitize_text(" \n\t "), "");
    }

    // ---- ClipboardTextSink protocol ---------------------------------------

    /// Records every backend call so tests can assert the exact protocol.
    struct FakeBackend {
        ops: Vec<String>,
        clipboard: Option<String>,
        fail_set: bool,
        fail_paste: bool,
        remote: bool,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                ops: Vec::new(),
                clipboard: Some("old contents".to_string()),
                fail_set: false,
                fail_paste: false,
                remote: false,
            }
        }
    }

    impl PasteBackend for FakeBackend {
        fn snapshot(&mut self) -> Result<Option<String>, DeliveryError> {
            self.ops.push("snapshot".into());
            Ok(self.clipboard.clone())
        }

        fn set_text(&mut self, text: &str) -> Result<(), DeliveryError> {
            self.ops.push(format!("set:{text}"));
            if self.fail_set {
                return Err(DeliveryError::ClipboardSet("fake".into()));
            }
            self.clipboard = Some(text.to_string());
            Ok(())
        }

        fn send_paste(&mut self) -> Result<(), DeliveryError> {
            self.ops.push("paste".into());
            if self.fail_paste {
                return Err(DeliveryError::PasteFailed("fake".into()));
            }
            Ok(())
        }

        fn restore(&mut self, previous: Option<String>) -> Result<(), DeliveryError> {
            self.ops.push(format!("restore:{previous:?}"));
            self.clipboard = previous;
            Ok(())
        }

        fn remote_session(&mut self) -> bool {
            self.remote
        }
    }

    fn sink_with(backend: FakeBackend) -> ClipboardTextSink<FakeBackend> {
        ClipboardTextSink::with_backend(backend, &DeliveryConfig::default())
    }

    fn ops(sink: &ClipboardTextSink<FakeBackend>) -> Vec<String> {
        sink.backend.lock().unwrap().ops.clone()
    }

    #[test]
    fn deliver_runs_save_set_paste_restore_in_order() {
        let sink = sink_with(FakeBackend::new());
        sink.deliver("hello").unwrap();
        assert_eq!(
            ops(&sink),
            vec![
                "snapshot",
                "set:hello",
                "paste",
                "restore:Some(\"old contents\")",
            ]
        );
    }

    #[test]
    fn restore_runs_exactly_once_when_paste_fails() {
        let mut backend = FakeBackend::new();
        backend.fail_paste = true;
        let sink = sink_with(backend);

        let err = sink.deliver("hello").unwrap_err();
        assert!(matches!(err, DeliveryError::PasteFailed(_)));

        let ops = ops(&sink);
        assert_eq!(ops.iter().filter(|op| op.starts_with("restore")).count(), 1);
        // The previous contents must come back even on failure.
        assert_eq!(
            sink.backend.lock().unwrap().clipboard.as_deref(),
            Some("old contents")
        );
    }

    #[test]
    fn restore_runs_exactly_once_when_set_fails() {
        let mut backend = FakeBackend::new();
        backend.fail_set = true;
        let sink = sink_with(backend);

        let err = sink.deliver("hello").unwrap_err();
        assert!(matches!(err, DeliveryError::ClipboardSet(_)));

        let ops = ops(&sink);
        assert_eq!(ops.iter().filter(|op| op.starts_with("restore")).count(), 1);
        // set failed, so paste must not have been attempted.
        assert!(!ops.iter().any(|op| op == "paste"));
    }

    #[test]
    fn empty_transcript_is_a_noop() {
        let sink = sink_with(FakeBackend::new());
        sink.deliver("   \n ").unwrap();
        assert!(ops(&sink).is_empty());
    }

    #[test]
    fn transcript_is_sanitized_before_set() {
        let sink = sink_with(FakeBackend::new());
        sink.deliver(" hi\u{7} there ").unwrap();
        assert!(ops(&sink).contains(&"set:hi there".to_string()));
    }

    #[test]
    fn remote_session_uses_rdp_delay() {
        let mut backend = FakeBackend::new();
        backend.remote = true;
        let config = DeliveryConfig {
            paste_delay_ms: 0,
            rdp_paste_delay_ms: 50,
            ..DeliveryConfig::default()
        };
        let sink = ClipboardTextSink::with_backend(backend, &config);

        let started = Instant::now();
        sink.deliver("hello").unwrap();
        assert!(
            started.elapsed() >= Duration::from_millis(40),
            "RDP delay was not applied"
        );
    }
}
