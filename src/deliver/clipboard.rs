//! Clipboard access and the [`PasteBackend`] abstraction.
//!
//! Clipboard handles are opened per call rather than held for the process
//! lifetime: on X11 a long-lived owner can block other applications from
//! claiming the selection.

use arboard::Clipboard;

use super::paste;
use super::DeliveryError;

// ---------------------------------------------------------------------------
// PasteBackend trait
// ---------------------------------------------------------------------------

/// Low-level operations behind the clipboard-paste delivery protocol.
///
/// [`ClipboardTextSink`](super::ClipboardTextSink) drives these in a fixed
/// order: `snapshot` → `set_text` → `send_paste` → `restore`. Splitting the
/// protocol from the plumbing keeps the ordering and restore guarantees
/// testable without a display server.
pub trait PasteBackend: Send {
    /// Current clipboard text, or `None` when the clipboard is empty or
    /// holds non-text content.
    fn snapshot(&mut self) -> Result<Option<String>, DeliveryError>;

    /// Replace the clipboard contents with `text`.
    fn set_text(&mut self, text: &str) -> Result<(), DeliveryError>;

    /// Synthesize the platform paste chord into the focused application.
    fn send_paste(&mut self) -> Result<(), DeliveryError>;

    /// Put back what [`snapshot`](PasteBackend::snapshot) captured.
    /// `None` means the clipboard was empty; restoring clears it.
    fn restore(&mut self, previous: Option<String>) -> Result<(), DeliveryError>;

    /// Whether the machine is being driven over a remote desktop session.
    fn remote_session(&mut self) -> bool;
}

// ---------------------------------------------------------------------------
// SystemPasteBackend
// ---------------------------------------------------------------------------

/// Production backend over `arboard` and the synthetic keyboard in
/// [`paste`].
pub struct SystemPasteBackend {
    _priv: (),
}

impl SystemPasteBackend {
    pub fn new() -> Self {
        Self { _priv: () }
    }

    fn open() -> Result<Clipboard, DeliveryError> {
        Clipboard::new().map_err(|e| DeliveryError::ClipboardUnavailable(e.to_string()))
    }
}

impl Default for SystemPasteBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PasteBackend for SystemPasteBackend {
    fn snapshot(&mut self) -> Result<Option<String>, DeliveryError> {
        let mut clipboard = Self::open()?;
        // get_text errors on empty or non-text clipboards; both mean there
        // is nothing we can restore.
        Ok(clipboard.get_text().ok().filter(|t| !t.is_empty()))
    }

    fn set_text(&mut self, text: &str) -> Result<(), DeliveryError> {
        let mut clipboard = Self::open()?;
        clipboard
            .set_text(text)
            .map_err(|e| DeliveryError::ClipboardSet(e.to_string()))
    }

    fn send_paste(&mut self) -> Result<(), DeliveryError> {
        paste::send_paste_chord()
    }

    fn restore(&mut self, previous: Option<String>) -> Result<(), DeliveryError> {
        let mut clipboard = Self::open()?;
        match previous {
            Some(text) => clipboard
                .set_text(text)
                .map_err(|e| DeliveryError::ClipboardSet(e.to_string())),
            None => {
                // Best effort: arboard cannot always clear, ignore failures.
                let _ = clipboard.clear();
                Ok(())
            }
        }
    }

    fn remote_session(&mut self) -> bool {
        paste::remote_session_active()
    }
}
