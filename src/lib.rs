//! Push-to-talk voice typing: hold a key, speak, release, and the
//! transcribed text is pasted into whatever application has focus.
//!
//! The crate is organised around a small pipeline:
//!
//! * [`event`] — global trigger-key listener producing normalized
//!   down/up events;
//! * [`audio`] — microphone capture and per-session sample buffering;
//! * [`stt`] — speech-to-text behind the [`stt::Transcriber`] trait
//!   (Whisper in production);
//! * [`deliver`] — clipboard-paste text delivery with save/restore;
//! * [`history`] — optional daily transcript log;
//! * [`pipeline`] — the state machine and orchestrator tying it together;
//! * [`config`] — TOML settings and platform paths.

pub mod audio;
pub mod config;
pub mod deliver;
pub mod event;
pub mod history;
pub mod pipeline;
pub mod stt;
