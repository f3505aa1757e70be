//! Trigger-key event source, backed by `rdev`.
//!
//! The orchestrator only ever sees normalized [`KeyEvent`]s for the single
//! configured trigger key. Everything else — other keys, mouse events, OS
//! key-repeat while the trigger is held — is filtered out at the source by
//! [`TriggerKeyListener`].
//!
//! # Usage
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use pushscribe::event::{parse_key, KeyEvent, TriggerKeyListener};
//!
//! let (tx, mut rx) = mpsc::channel::<KeyEvent>(32);
//! let key = parse_key("RightCtrl").expect("unknown key");
//! let _listener = TriggerKeyListener::start(key, tx);
//!
//! // In your async loop:
//! // while let Some(ev) = rx.recv().await { ... }
//! ```

pub mod listener;

pub use listener::TriggerKeyListener;

use std::time::Instant;

// ---------------------------------------------------------------------------
// KeyEvent
// ---------------------------------------------------------------------------

/// Direction of a trigger-key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    /// The trigger key went down (first press only — repeats suppressed).
    Down,
    /// The trigger key was released.
    Up,
}

/// A normalized trigger-key event as emitted by [`TriggerKeyListener`].
///
/// Timestamps are monotonic and strictly increasing across all events from
/// one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Down or Up.
    pub kind: KeyEventKind,
    /// Monotonic timestamp taken when the event was observed.
    pub at: Instant,
}

impl KeyEvent {
    /// Shorthand used by tests and the listener.
    pub fn new(kind: KeyEventKind, at: Instant) -> Self {
        Self { kind, at }
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a trigger-key name from a config string into an [`rdev::Key`].
///
/// Supports `F1`–`F12`, single ASCII letters (case-insensitive), and the
/// named keys a user would plausibly bind push-to-talk to (modifiers,
/// `Space`, `CapsLock`, …).
///
/// Returns `None` for unrecognised names so callers can fall back to a
/// default or report a config error.
///
/// # Examples
///
/// ```
/// use pushscribe::event::parse_key;
///
/// assert_eq!(parse_key("F9"),        Some(rdev::Key::F9));
/// assert_eq!(parse_key("RightCtrl"), Some(rdev::Key::ControlRight));
/// assert_eq!(parse_key("a"),         Some(rdev::Key::KeyA));
/// assert_eq!(parse_key("xyz"),       None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key;

    const F_KEYS: [Key; 12] = [
        Key::F1,
        Key::F2,
        Key::F3,
        Key::F4,
        Key::F5,
        Key::F6,
        Key::F7,
        Key::F8,
        Key::F9,
        Key::F10,
        Key::F11,
        Key::F12,
    ];

    const LETTER_KEYS: [Key; 26] = [
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
        Key::KeyG,
        Key::KeyH,
        Key::KeyI,
        Key::KeyJ,
        Key::KeyK,
        Key::KeyL,
        Key::KeyM,
        Key::KeyN,
        Key::KeyO,
        Key::KeyP,
        Key::KeyQ,
        Key::KeyR,
        Key::KeyS,
        Key::KeyT,
        Key::KeyU,
        Key::KeyV,
        Key::KeyW,
        Key::KeyX,
        Key::KeyY,
        Key::KeyZ,
    ];

    // Function keys: "F1" … "F12".
    if let Some(n) = name
        .strip_prefix('F')
        .and_then(|digits| digits.parse::<usize>().ok())
    {
        if (1..=12).contains(&n) {
            return Some(F_KEYS[n - 1]);
        }
    }

    // Single ASCII letters, case-insensitive.
    if name.len() == 1 {
        let c = name.as_bytes()[0].to_ascii_lowercase();
        if c.is_ascii_lowercase() {
            return Some(LETTER_KEYS[(c - b'a') as usize]);
        }
    }

    // Named keys.
    match name {
        "LeftCtrl" | "ControlLeft" => Some(Key::ControlLeft),
        "RightCtrl" | "ControlRight" => Some(Key::ControlRight),
        "LeftShift" | "ShiftLeft" => Some(Key::ShiftLeft),
        "RightShift" | "ShiftRight" => Some(Key::ShiftRight),
        "LeftAlt" | "Alt" => Some(Key::Alt),
        "RightAlt" | "AltGr" => Some(Key::AltGr),
        "LeftMeta" | "MetaLeft" | "Super" => Some(Key::MetaLeft),
        "RightMeta" | "MetaRight" => Some(Key::MetaRight),
        "Space" => Some(Key::Space),
        "CapsLock" => Some(Key::CapsLock),
        "Tab" => Some(Key::Tab),
        "Escape" | "Esc" => Some(Key::Escape),
        "Home" => Some(Key::Home),
        "End" => Some(Key::End),
        "Pause" => Some(Key::Pause),
        "ScrollLock" => Some(Key::ScrollLock),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_function_keys() {
        assert_eq!(parse_key("F1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
        assert_eq!(parse_key("F12"), Some(rdev::Key::F12));
        assert_eq!(parse_key("F13"), None);
        assert_eq!(parse_key("F0"), None);
    }

    #[test]
    fn parse_modifier_keys() {
        assert_eq!(parse_key("RightCtrl"), Some(rdev::Key::ControlRight));
        assert_eq!(parse_key("ControlRight"), Some(rdev::Key::ControlRight));
        assert_eq!(parse_key("LeftCtrl"), Some(rdev::Key::ControlLeft));
        assert_eq!(parse_key("RightShift"), Some(rdev::Key::ShiftRight));
        assert_eq!(parse_key("AltGr"), Some(rdev::Key::AltGr));
    }

    #[test]
    fn parse_letter_keys_case_insensitive() {
        assert_eq!(parse_key("A"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("a"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("Z"), Some(rdev::Key::KeyZ));
        assert_eq!(parse_key("z"), Some(rdev::Key::KeyZ));
    }

    #[test]
    fn parse_unknown_key_returns_none() {
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("Ctrl+V"), None);
        assert_eq!(parse_key("1"), None);
    }
}
