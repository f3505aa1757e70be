//! Core transcriber trait and the whisper-rs implementation.
//!
//! [`Transcriber`] is object-safe and `Send + Sync` so it can be held behind
//! an `Arc<dyn Transcriber>` and invoked from `spawn_blocking`.
//!
//! [`ScriptedTranscriber`] (available under `#[cfg(test)]`) returns
//! pre-configured responses with optional per-call latency — useful for
//! exercising the pipeline's ordering guarantees without a model file.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::SampleBuffer;

// ---------------------------------------------------------------------------
// TranscribeError
// ---------------------------------------------------------------------------

/// All errors that can arise from the transcription boundary.
#[derive(Debug, Clone, Error)]
pub enum TranscribeError {
    /// The GGML model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The engine failed to initialise from the model file.
    #[error("engine initialisation failed: {0}")]
    EngineInit(String),

    /// The engine failed during inference. Reported to the user; the
    /// session is discarded.
    #[error("transcription failed: {0}")]
    Engine(String),

    /// The call succeeded but no speech was detected. A silent no-op, not a
    /// user-visible error.
    #[error("no speech detected")]
    NoSpeech,
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-to-text engines.
///
/// # Contract
///
/// * `audio` is mono PCM at the rate recorded in the buffer (16 kHz for
///   Whisper).
/// * The call is synchronous and may take seconds; callers must run it off
///   the event-handling path.
/// * An empty transcript is reported as [`TranscribeError::NoSpeech`], never
///   as `Ok("")`.
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` using `language` as a hint (`"auto"` to let the
    /// engine detect).
    fn transcribe(&self, audio: &SampleBuffer, language: &str)
        -> Result<String, TranscribeError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// WhisperTranscriber
// ---------------------------------------------------------------------------

/// Production transcriber that wraps a `whisper_rs::WhisperContext`.
///
/// A new `WhisperState` is created for every call so the engine can be
/// shared across threads without locking.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    beam_size: i32,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("beam_size", &self.beam_size)
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send` and `unsafe impl Sync` in whisper-rs — the model
// weights are read-only after loading.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperTranscriber {}
unsafe impl Sync for WhisperTranscriber {}

impl WhisperTranscriber {
    /// Load a GGML model from `model_path` and prepare it for inference.
    ///
    /// GPU offload is a construction-time decision; there is no runtime
    /// fallback switching.
    ///
    /// # Errors
    ///
    /// * [`TranscribeError::ModelNotFound`] — `model_path` does not exist.
    /// * [`TranscribeError::EngineInit`] — whisper-rs failed to load it.
    pub fn load(
        model_path: impl AsRef<Path>,
        beam_size: i32,
        use_gpu: bool,
    ) -> Result<Self, TranscribeError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(TranscribeError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            TranscribeError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(use_gpu);

        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| TranscribeError::EngineInit(e.to_string()))?;

        Ok(Self {
            ctx,
            beam_size,
            n_threads: optimal_threads(),
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(
        &self,
        audio: &SampleBuffer,
        language: &str,
    ) -> Result<String, TranscribeError> {
        if audio.samples.is_empty() {
            return Err(TranscribeError::NoSpeech);
        }

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: self.beam_size,
            patience: -1.0,
        });

        // set_language takes an Option<&str> whose lifetime is tied to the
        // params; both stay alive until state.full() returns.
        let lang: Option<&str> = if language == "auto" {
            None
        } else {
            Some(language)
        };
        params.set_language(lang);
        params.set_n_threads(self.n_threads);
        params.set_print_progress(false);
        params.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::EngineInit(e.to_string()))?;

        state
            .full(params, &audio.samples)
            .map_err(|e| TranscribeError::Engine(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| TranscribeError::Engine(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| TranscribeError::Engine(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(TranscribeError::NoSpeech);
        }
        Ok(text)
    }
}

/// Number of CPU threads handed to Whisper, capped at 8 to avoid
/// diminishing returns.
fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// ScriptedTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that replays a script of `(latency, result)` pairs, one per
/// call, without loading any model file.
///
/// The artificial latency runs inside `transcribe` itself, which the
/// pipeline calls through `spawn_blocking` — exactly how a slow engine
/// behaves in production.
#[cfg(test)]
pub struct ScriptedTranscriber {
    script: std::sync::Mutex<std::collections::VecDeque<ScriptEntry>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
type ScriptEntry = (std::time::Duration, Result<String, TranscribeError>);

#[cfg(test)]
impl ScriptedTranscriber {
    pub fn new() -> Self {
        Self {
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Queue a response returned after `latency`.
    pub fn push(&self, latency: std::time::Duration, result: Result<String, TranscribeError>) {
        self.script.lock().unwrap().push_back((latency, result));
    }

    /// Queue an instant `Ok(text)` response.
    pub fn push_ok(&self, text: &str) {
        self.push(std::time::Duration::ZERO, Ok(text.to_string()));
    }

    /// Number of `transcribe` calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Transcriber for ScriptedTranscriber {
    fn transcribe(
        &self,
        _audio: &SampleBuffer,
        _language: &str,
    ) -> Result<String, TranscribeError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let (latency, result) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((std::time::Duration::ZERO, Err(TranscribeError::Engine("script exhausted".into()))));
        std::thread::sleep(latency);
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
