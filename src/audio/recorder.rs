//! Recording-session lifecycle on top of the continuously running capture
//! stream.
//!
//! [`Recorder`] is the capability trait the orchestrator drives; it owns
//! session lifetime decisions, the recorder owns buffering. [`MicRecorder`]
//! is the production implementation: a shared buffer fed by the audio
//! collector thread, gated by a `recording` flag flipped in `start()` /
//! `stop()`.
//!
//! Session rules:
//!
//! * at most one open session (`start()` twice → [`CaptureError::AlreadyRecording`]);
//! * `stop()` without a session → [`CaptureError::NotRecording`], never
//!   silently ignored;
//! * sessions below the configured minimum duration →
//!   [`CaptureError::TooShort`];
//! * device loss during the session → [`CaptureError::DeviceLost`] and the
//!   captured samples are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Instant;

use crate::config::AudioConfig;

use super::capture::{AudioCapture, CaptureError, StreamHandle};
use super::resample::{downmix_to_mono, resample};

// ---------------------------------------------------------------------------
// SampleBuffer
// ---------------------------------------------------------------------------

/// An immutable, finished recording: mono `f32` samples at the configured
/// rate, gain already applied.
///
/// Produced by [`Recorder::stop`] and consumed exactly once by the
/// transcriber.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// Mono PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count (always 1 after downmix).
    pub channels: u16,
}

impl SampleBuffer {
    /// Recording length in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Recorder trait
// ---------------------------------------------------------------------------

/// Capability interface for audio recording, driven by the orchestrator.
///
/// Implementations must be `Send` so the orchestrator task can own one.
pub trait Recorder: Send {
    /// Open a recording session.
    ///
    /// # Errors
    ///
    /// [`CaptureError::AlreadyRecording`] when a session is already open —
    /// this is a programming error upstream, the orchestrator's single-flight
    /// rule must prevent it.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Close the session and return everything captured since [`start`].
    ///
    /// # Errors
    ///
    /// * [`CaptureError::NotRecording`] — no session open.
    /// * [`CaptureError::TooShort`] — below the minimum duration.
    /// * [`CaptureError::DeviceLost`] — the input device disappeared.
    ///
    /// [`start`]: Recorder::start
    fn stop(&mut self) -> Result<SampleBuffer, CaptureError>;
}

// ---------------------------------------------------------------------------
// MicRecorder
// ---------------------------------------------------------------------------

/// Buffer state shared between the audio collector thread and the recorder.
struct Shared {
    /// Mono samples at the target rate, accumulated while `recording`.
    samples: Vec<f32>,
    /// Gate checked by the collector thread before appending.
    recording: bool,
}

/// Production [`Recorder`] backed by the cpal capture stream.
///
/// Create one with [`MicRecorder::spawn`], which opens the default input
/// device, starts the stream and the collector thread, and returns the
/// recorder together with the [`StreamHandle`] RAII guard. The guard is not
/// `Send` — keep it on the thread that called `spawn` (typically `main`).
pub struct MicRecorder {
    shared: Arc<Mutex<Shared>>,
    device_lost: Arc<AtomicBool>,
    config: AudioConfig,
    /// Wall-clock session start; `Some` while a session is open.
    started_at: Option<Instant>,
}

impl MicRecorder {
    /// Open the default input device and start the capture pipeline.
    ///
    /// # Errors
    ///
    /// Propagates [`CaptureError`]s from device negotiation or stream
    /// startup. These are fatal at construction — there is nothing to record
    /// from.
    pub fn spawn(config: &AudioConfig) -> Result<(Self, StreamHandle), CaptureError> {
        let capture = AudioCapture::open(config)?;
        let source_rate = capture.sample_rate();
        let source_channels = capture.channels();
        let target_rate = config.sample_rate;

        let shared = Arc::new(Mutex::new(Shared {
            samples: Vec::new(),
            recording: false,
        }));
        let device_lost = Arc::new(AtomicBool::new(false));

        let (chunk_tx, chunk_rx) = mpsc::channel();
        let handle = capture.start(chunk_tx, Arc::clone(&device_lost))?;

        log::info!(
            "audio capture started ({source_rate} Hz, {source_channels} ch, \
             target {target_rate} Hz mono)"
        );

        // Collector thread: drains cpal chunks, converts to the target
        // format, and appends to the session buffer while recording is on.
        // Exits when the stream (and its sender) is dropped.
        let shared_writer = Arc::clone(&shared);
        std::thread::Builder::new()
            .name("audio-collector".into())
            .spawn(move || {
                while let Ok(chunk) = chunk_rx.recv() {
                    {
                        let guard = shared_writer.lock().unwrap();
                        if !guard.recording {
                            continue;
                        }
                    }

                    let mono = downmix_to_mono(&chunk.samples, chunk.channels);
                    let converted = resample(&mono, chunk.sample_rate, target_rate);

                    shared_writer
                        .lock()
                        .unwrap()
                        .samples
                        .extend_from_slice(&converted);
                }
            })
            .expect("failed to spawn audio-collector thread");

        Ok((
            Self::from_parts(shared, device_lost, config.clone()),
            handle,
        ))
    }

    /// Assemble a recorder from its shared pieces. Used by [`spawn`] and by
    /// tests that want to drive the session lifecycle without a device.
    ///
    /// [`spawn`]: MicRecorder::spawn
    fn from_parts(
        shared: Arc<Mutex<Shared>>,
        device_lost: Arc<AtomicBool>,
        config: AudioConfig,
    ) -> Self {
        Self {
            shared,
            device_lost,
            config,
            started_at: None,
        }
    }
}

impl Recorder for MicRecorder {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.started_at.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        if self.device_lost.load(Ordering::Relaxed) {
            return Err(CaptureError::DeviceLost);
        }

        let mut shared = self.shared.lock().unwrap();
        shared.samples.clear();
        shared.recording = true;
        drop(shared);

        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) -> Result<SampleBuffer, CaptureError> {
        self.started_at.take().ok_or(CaptureError::NotRecording)?;

        let mut samples = {
            let mut shared = self.shared.lock().unwrap();
            shared.recording = false;
            std::mem::take(&mut shared.samples)
        };

        if self.device_lost.load(Ordering::Relaxed) {
            return Err(CaptureError::DeviceLost);
        }

        let secs = samples.len() as f32 / self.config.sample_rate as f32;
        if secs < self.config.min_recording_secs {
            return Err(CaptureError::TooShort { secs });
        }

        apply_gain(&mut samples, self.config.gain);

        Ok(SampleBuffer {
            samples,
            sample_rate: self.config.sample_rate,
            channels: 1,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Scale samples by `gain`, clamping to the valid `[-1.0, 1.0]` range so
/// loud input clips instead of overflowing downstream conversions.
fn apply_gain(samples: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for s in samples.iter_mut() {
        *s = (*s * gain).clamp(-1.0, 1.0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
