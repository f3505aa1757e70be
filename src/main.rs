//! Binary entry point: wire configuration, audio capture, the Whisper
//! engine, clipboard delivery and the trigger-key listener into the
//! push-to-talk orchestrator, then run until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use env_logger::Env;
use tokio::sync::mpsc;

use pushscribe::audio::{MicRecorder, SampleBuffer};
use pushscribe::config::{AppConfig, AppPaths};
use pushscribe::deliver::ClipboardTextSink;
use pushscribe::event::{parse_key, KeyEvent, TriggerKeyListener};
use pushscribe::history::TranscriptLog;
use pushscribe::pipeline::{new_shared_state, PttOrchestrator};
use pushscribe::stt::{TranscribeError, Transcriber, WhisperTranscriber};

// ---------------------------------------------------------------------------
// NoModelTranscriber
// ---------------------------------------------------------------------------

/// Placeholder engine used when no model file is present, so the app still
/// starts and the user gets an actionable message on first use instead of a
/// startup crash.
struct NoModelTranscriber {
    model_path: PathBuf,
}

impl Transcriber for NoModelTranscriber {
    fn transcribe(&self, _audio: &SampleBuffer, _language: &str) -> Result<String, TranscribeError> {
        Err(TranscribeError::ModelNotFound(format!(
            "no model loaded — place a GGML model at {}",
            self.model_path.display()
        )))
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("failed to load settings, using defaults: {e}");
            AppConfig::default()
        }
    };

    let paths = AppPaths::new();
    if let Err(e) = std::fs::create_dir_all(&paths.models_dir) {
        log::warn!("could not create models directory: {e}");
    }

    let model_path = paths.models_dir.join(format!("{}.bin", config.stt.model));
    let transcriber: Arc<dyn Transcriber> =
        match WhisperTranscriber::load(&model_path, config.stt.beam_size, config.stt.use_gpu) {
            Ok(engine) => {
                log::info!("loaded model {}", model_path.display());
                Arc::new(engine)
            }
            Err(e) => {
                log::warn!("{e}; transcription disabled until a model is installed");
                Arc::new(NoModelTranscriber { model_path })
            }
        };

    // The stream handle is !Send and must outlive the orchestrator, so it
    // stays on the main task for the whole run.
    let (recorder, _audio_stream) =
        MicRecorder::spawn(&config.audio).context("failed to start audio capture")?;

    let sink = Arc::new(ClipboardTextSink::new(&config.delivery));

    let history = if config.history.enabled {
        match TranscriptLog::new(&paths.history_dir) {
            Ok(log) => Some(Arc::new(log)),
            Err(e) => {
                log::warn!("history disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let trigger = parse_key(&config.hotkey.trigger_key).unwrap_or_else(|| {
        log::warn!(
            "unknown trigger key {:?}, falling back to RightCtrl",
            config.hotkey.trigger_key
        );
        rdev::Key::ControlRight
    });

    let (key_tx, key_rx) = mpsc::channel::<KeyEvent>(32);
    let _listener = TriggerKeyListener::start(trigger, key_tx);
    log::info!(
        "ready — hold {} to record, release to transcribe and paste",
        config.hotkey.trigger_key
    );

    let state = new_shared_state();
    let orchestrator = PttOrchestrator::new(state, Box::new(recorder), transcriber, sink, history, &config);

    tokio::select! {
        _ = orchestrator.run(key_rx) => {
            bail!("trigger key listener stopped (check input permissions)");
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutting down");
        }
    }

    Ok(())
}
