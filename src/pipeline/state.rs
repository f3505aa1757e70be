//! The push-to-talk state machine.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Lifecycle state of the push-to-talk loop.
///
/// Transitions are driven solely by the orchestrator:
///
/// ```text
/// Idle --key down--> Recording --key up--> Transcribing --all settled--> Idle
///                        ^                       |
///                        +------key down---------+   (record while a previous
///                                                     session still transcribes)
/// ```
///
/// `Recording` is single-flight: a key down in `Recording` is ignored.
/// `Transcribing` covers any number of in-flight sessions; the machine
/// returns to `Idle` only when the last one settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttState {
    /// Nothing recording, nothing pending.
    Idle,
    /// A recording session is open (trigger key held).
    Recording,
    /// At least one session is transcribing or awaiting delivery.
    Transcribing,
}

impl PttState {
    pub fn is_idle(&self) -> bool {
        *self == Self::Idle
    }

    pub fn is_recording(&self) -> bool {
        *self == Self::Recording
    }
}

impl fmt::Display for PttState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::Transcribing => write!(f, "transcribing"),
        }
    }
}

/// State cell shared between the orchestrator and anything that wants to
/// observe it (status display, tests).
pub type SharedState = Arc<Mutex<PttState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(PttState::Idle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_idle() {
        let state = new_shared_state();
        assert!(state.lock().unwrap().is_idle());
    }

    #[test]
    fn display_names() {
        assert_eq!(PttState::Idle.to_string(), "idle");
        assert_eq!(PttState::Recording.to_string(), "recording");
        assert_eq!(PttState::Transcribing.to_string(), "transcribing");
    }
}
