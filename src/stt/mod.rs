//! Speech-to-text boundary.
//!
//! [`Transcriber`] is the narrow interface the pipeline consumes: a finite
//! [`SampleBuffer`](crate::audio::SampleBuffer) plus a language hint in,
//! text or an error out. Request/response only — no streaming.
//!
//! [`WhisperTranscriber`] is the production implementation over `whisper-rs`.
//! Model and GPU/CPU selection happen at construction; the pipeline never
//! makes runtime engine decisions.

pub mod engine;

pub use engine::{Transcriber, TranscribeError, WhisperTranscriber};

// test-only re-export so the pipeline test module can use the scripted
// double without reaching into `engine`.
#[cfg(test)]
pub use engine::ScriptedTranscriber;
