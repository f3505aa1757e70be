//! Audio capture pipeline — microphone → cpal callback → collector thread →
//! shared session buffer.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → downmix_to_mono
//!           → resample → session buffer (while recording is flagged on)
//! ```
//!
//! The cpal stream runs for the lifetime of the process; recording sessions
//! are delimited purely by the [`Recorder`] flag so that `start()` never has
//! to renegotiate the device. [`MicRecorder`] enforces the session lifecycle
//! (single session, minimum duration, gain) — the orchestrator owns *when*,
//! this module owns *how*.

pub mod capture;
pub mod recorder;
pub mod resample;

pub use capture::{AudioCapture, AudioChunk, CaptureError, StreamHandle};
pub use recorder::{MicRecorder, Recorder, SampleBuffer};
pub use resample::{downmix_to_mono, resample};
