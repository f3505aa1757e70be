//! The push-to-talk event loop.
//!
//! [`PttOrchestrator`] owns the state machine and the recorder, and reacts
//! to trigger-key events: key down opens a recording session, key up closes
//! it and hands the captured audio to the transcriber. Transcription runs
//! detached on the blocking pool so the loop stays responsive — a new
//! recording can start while previous sessions are still transcribing.
//!
//! # Delivery ordering
//!
//! Sessions can finish transcribing out of order (a long recording closed
//! before a short one may complete after it). To keep pasted text in the
//! order the user spoke it, every session registers a oneshot receiver with
//! a single delivery worker *at close time*; the worker consumes receivers
//! strictly in that order, so a finished later session waits for the
//! earlier one. [`DeliveryOrder::LatestWins`] relaxes this: when newer
//! sessions are already queued behind a settled one, everything but the
//! newest is discarded.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::audio::{CaptureError, Recorder, SampleBuffer};
use crate::config::{AppConfig, DeliveryOrder};
use crate::deliver::TextSink;
use crate::event::{KeyEvent, KeyEventKind};
use crate::history::TranscriptLog;
use crate::stt::{TranscribeError, Transcriber};

use super::state::{PttState, SharedState};

// ---------------------------------------------------------------------------
// Session bookkeeping
// ---------------------------------------------------------------------------

/// Monotonic identifier assigned at session close.
type SessionId = u64;

/// A session whose transcription is in flight, queued with the delivery
/// worker in close order.
struct PendingDelivery {
    session: SessionId,
    rx: oneshot::Receiver<Result<String, TranscribeError>>,
}

// ---------------------------------------------------------------------------
// PttOrchestrator
// ---------------------------------------------------------------------------

/// Drives the record → transcribe → deliver pipeline from trigger-key
/// events.
///
/// Construct with [`PttOrchestrator::new`] (requires a running tokio
/// runtime — it spawns the delivery worker), then hand it the key-event
/// receiver via [`run`].
///
/// [`run`]: PttOrchestrator::run
pub struct PttOrchestrator {
    state: SharedState,
    recorder: Box<dyn Recorder>,
    transcriber: Arc<dyn Transcriber>,
    language: String,
    /// Close-ordered queue into the delivery worker.
    pending_tx: mpsc::UnboundedSender<PendingDelivery>,
    /// Settled-session notifications back from the worker.
    done_rx: mpsc::UnboundedReceiver<SessionId>,
    in_flight: usize,
    next_session: SessionId,
}

impl PttOrchestrator {
    pub fn new(
        state: SharedState,
        recorder: Box<dyn Recorder>,
        transcriber: Arc<dyn Transcriber>,
        sink: Arc<dyn TextSink>,
        history: Option<Arc<TranscriptLog>>,
        config: &AppConfig,
    ) -> Self {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        tokio::spawn(delivery_worker(
            pending_rx,
            sink,
            history,
            config.delivery.order,
            done_tx,
        ));

        Self {
            state,
            recorder,
            transcriber,
            language: config.stt.language.clone(),
            pending_tx,
            done_rx,
            in_flight: 0,
            next_session: 1,
        }
    }

    /// Run the event loop until the key-event source closes.
    ///
    /// Before returning, waits for every in-flight session to settle so
    /// pending deliveries finish their clipboard restore.
    pub async fn run(mut self, mut key_rx: mpsc::Receiver<KeyEvent>) {
        loop {
            tokio::select! {
                event = key_rx.recv() => match event {
                    Some(event) => self.handle_key(event),
                    None => break,
                },
                Some(id) = self.done_rx.recv() => self.on_session_done(id),
            }
        }

        log::info!("key event source closed, draining {} session(s)", self.in_flight);
        while self.in_flight > 0 {
            match self.done_rx.recv().await {
                Some(id) => self.on_session_done(id),
                None => break,
            }
        }
    }

    fn handle_key(&mut self, event: KeyEvent) {
        match event.kind {
            KeyEventKind::Down => self.on_key_down(),
            KeyEventKind::Up => self.on_key_up(),
        }
    }

    /// Key down: open a recording session unless one is already open.
    fn on_key_down(&mut self) {
        if self.state.lock().unwrap().is_recording() {
            log::debug!("key down while already recording, ignored");
            return;
        }

        match self.recorder.start() {
            Ok(()) => {
                *self.state.lock().unwrap() = PttState::Recording;
                log::info!("recording started");
            }
            Err(e) => log::error!("could not start recording: {e}"),
        }
    }

    /// Key up: close the session and spawn its transcription.
    fn on_key_up(&mut self) {
        if !self.state.lock().unwrap().is_recording() {
            log::debug!("key up with no open recording session, ignored");
            return;
        }

        match self.recorder.stop() {
            Ok(buffer) => self.spawn_transcription(buffer),
            Err(CaptureError::TooShort { secs }) => {
                log::info!("discarded recording: too short ({secs:.1}s)");
                self.settle_state();
            }
            Err(CaptureError::DeviceLost) => {
                log::warn!("audio device lost, recording discarded");
                self.settle_state();
            }
            Err(e) => {
                log::error!("failed to stop recording: {e}");
                self.settle_state();
            }
        }
    }

    /// Hand a finished buffer to the transcriber and register its delivery
    /// slot, keeping the loop free for the next key event.
    fn spawn_transcription(&mut self, buffer: SampleBuffer) {
        let session = self.next_session;
        self.next_session += 1;

        let (tx, rx) = oneshot::channel();
        if self.pending_tx.send(PendingDelivery { session, rx }).is_err() {
            log::error!("delivery worker is gone, dropping session {session}");
            self.settle_state();
            return;
        }

        self.in_flight += 1;
        *self.state.lock().unwrap() = PttState::Transcribing;
        log::info!(
            "recording stopped ({:.1}s), transcribing session {session}",
            buffer.duration_secs()
        );

        let transcriber = Arc::clone(&self.transcriber);
        let language = self.language.clone();
        tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || transcriber.transcribe(&buffer, &language))
                    .await
                    .unwrap_or_else(|e| {
                        Err(TranscribeError::Engine(format!(
                            "transcription task failed: {e}"
                        )))
                    });
            // The worker observes a dropped sender as a settled session, so
            // a lost receiver needs no special handling here.
            let _ = tx.send(result);
        });
    }

    /// A session settled (delivered, dropped or failed).
    fn on_session_done(&mut self, session: SessionId) {
        self.in_flight = self.in_flight.saturating_sub(1);
        log::debug!("session {session} settled ({} still in flight)", self.in_flight);

        if self.in_flight == 0 {
            let mut state = self.state.lock().unwrap();
            // Don't clobber Recording: the user may already be holding the
            // key for the next utterance.
            if *state == PttState::Transcribing {
                *state = PttState::Idle;
            }
        }
    }

    /// Recompute the state after a session ended without entering the
    /// delivery queue.
    fn settle_state(&self) {
        *self.state.lock().unwrap() = if self.in_flight > 0 {
            PttState::Transcribing
        } else {
            PttState::Idle
        };
    }
}

// ---------------------------------------------------------------------------
// Delivery worker
// ---------------------------------------------------------------------------

/// Consumes sessions in close order and pastes their transcripts one at a
/// time. Exits when the orchestrator (the only `pending_tx` holder) drops.
async fn delivery_worker(
    mut pending_rx: mpsc::UnboundedReceiver<PendingDelivery>,
    sink: Arc<dyn TextSink>,
    history: Option<Arc<TranscriptLog>>,
    order: DeliveryOrder,
    done_tx: mpsc::UnboundedSender<SessionId>,
) {
    while let Some(pending) = pending_rx.recv().await {
        let mut current = pending;
        let mut result = await_result(&mut current).await;

        if order == DeliveryOrder::LatestWins {
            // Newer sessions already queued supersede this one; only the
            // newest gets delivered.
            while let Ok(mut next) = pending_rx.try_recv() {
                log::info!(
                    "session {} superseded by session {}, dropped",
                    current.session,
                    next.session
                );
                let _ = done_tx.send(current.session);
                result = await_result(&mut next).await;
                current = next;
            }
        }

        match result {
            Ok(text) => {
                deliver_one(&sink, &history, current.session, text).await;
            }
            Err(TranscribeError::NoSpeech) => {
                log::info!("session {}: no speech detected", current.session);
            }
            Err(e) => {
                log::warn!("session {}: transcription failed: {e}", current.session);
            }
        }

        let _ = done_tx.send(current.session);
    }
}

async fn await_result(pending: &mut PendingDelivery) -> Result<String, TranscribeError> {
    (&mut pending.rx).await.unwrap_or_else(|_| {
        Err(TranscribeError::Engine(
            "transcription result channel closed".into(),
        ))
    })
}

/// Paste one transcript and record it to history. Runs on the blocking pool
/// because clipboard and paste calls block.
async fn deliver_one(
    sink: &Arc<dyn TextSink>,
    history: &Option<Arc<TranscriptLog>>,
    session: SessionId,
    text: String,
) {
    let sink = Arc::clone(sink);
    let history = history.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        sink.deliver(&text)?;
        if let Some(history) = &history {
            if let Err(e) = history.append(&text) {
                log::warn!("failed to record transcript history: {e}");
            }
        }
        Ok::<(), crate::deliver::DeliveryError>(())
    })
    .await;

    match outcome {
        Ok(Ok(())) => {}
        // The sink already logged the specifics.
        Ok(Err(_)) => log::warn!("session {session}: delivery failed, transcript dropped"),
        Err(e) => log::error!("session {session}: delivery task failed: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::new_shared_state;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    // ---- test doubles ------------------------------------------------------

    /// Recorder that replays scripted `stop()` results and counts `start()`
    /// calls, enforcing the same session rules as the real one.
    struct MockRecorder {
        script: Mutex<VecDeque<Result<SampleBuffer, CaptureError>>>,
        starts: Arc<AtomicUsize>,
        recording: bool,
    }

    impl MockRecorder {
        fn new(script: Vec<Result<SampleBuffer, CaptureError>>) -> (Self, Arc<AtomicUsize>) {
            let starts = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    script: Mutex::new(script.into()),
                    starts: Arc::clone(&starts),
                    recording: false,
                },
                starts,
            )
        }
    }

    impl Recorder for MockRecorder {
        fn start(&mut self) -> Result<(), CaptureError> {
            if self.recording {
                return Err(CaptureError::AlreadyRecording);
            }
            self.recording = true;
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) -> Result<SampleBuffer, CaptureError> {
            if !self.recording {
                return Err(CaptureError::NotRecording);
            }
            self.recording = false;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CaptureError::NotRecording))
        }
    }

    /// Transcriber that maps a buffer's sample count to a scripted
    /// `(latency, result)` pair, making overlap tests deterministic.
    struct MappedTranscriber {
        map: Vec<(usize, Duration, Result<String, TranscribeError>)>,
        calls: AtomicUsize,
    }

    impl MappedTranscriber {
        fn new(map: Vec<(usize, Duration, Result<String, TranscribeError>)>) -> Self {
            Self {
                map,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transcriber for MappedTranscriber {
        fn transcribe(
            &self,
            audio: &SampleBuffer,
            _language: &str,
        ) -> Result<String, TranscribeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (_, latency, result) = self
                .map
                .iter()
                .find(|(len, _, _)| *len == audio.samples.len())
                .cloned()
                .unwrap_or((
                    0,
                    Duration::ZERO,
                    Err(TranscribeError::Engine("unexpected buffer".into())),
                ));
            std::thread::sleep(latency);
            result
        }
    }

    /// Sink that records every delivered transcript.
    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
            })
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    impl TextSink for RecordingSink {
        fn deliver(&self, text: &str) -> Result<(), crate::deliver::DeliveryError> {
            self.delivered.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    // ---- scenario driver ---------------------------------------------------

    fn buffer(samples: usize) -> SampleBuffer {
        SampleBuffer {
            samples: vec![0.0; samples],
            sample_rate: 16_000,
            channels: 1,
        }
    }

    fn down() -> KeyEvent {
        KeyEvent::new(KeyEventKind::Down, Instant::now())
    }

    fn up() -> KeyEvent {
        KeyEvent::new(KeyEventKind::Up, Instant::now())
    }

    /// Feed `events` to a fresh orchestrator, run it to completion, and
    /// return what got delivered plus the final state.
    async fn run_scenario(
        recorder: MockRecorder,
        transcriber: Arc<MappedTranscriber>,
        order: DeliveryOrder,
        events: Vec<KeyEvent>,
    ) -> (Arc<RecordingSink>, SharedState) {
        let mut config = AppConfig::default();
        config.delivery.order = order;

        let sink = RecordingSink::new();
        let state = new_shared_state();
        let orchestrator = PttOrchestrator::new(
            Arc::clone(&state),
            Box::new(recorder),
            transcriber,
            Arc::clone(&sink) as Arc<dyn TextSink>,
            None,
            &config,
        );

        let (tx, rx) = mpsc::channel(32);
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx);

        // run() drains all in-flight sessions before returning.
        orchestrator.run(rx).await;
        (sink, state)
    }

    // ---- scenarios ---------------------------------------------------------

    #[tokio::test]
    async fn records_transcribes_and_delivers() {
        let (recorder, _) = MockRecorder::new(vec![Ok(buffer(32_000))]);
        let transcriber = Arc::new(MappedTranscriber::new(vec![(
            32_000,
            Duration::ZERO,
            Ok("hello world".into()),
        )]));

        let (sink, state) =
            run_scenario(recorder, transcriber, DeliveryOrder::Fifo, vec![down(), up()]).await;

        assert_eq!(sink.delivered(), vec!["hello world"]);
        assert!(state.lock().unwrap().is_idle());
    }

    #[tokio::test]
    async fn repeated_key_down_opens_one_session() {
        let (recorder, starts) = MockRecorder::new(vec![Ok(buffer(32_000))]);
        let transcriber = Arc::new(MappedTranscriber::new(vec![(
            32_000,
            Duration::ZERO,
            Ok("once".into()),
        )]));

        let (sink, _) = run_scenario(
            recorder,
            transcriber,
            DeliveryOrder::Fifo,
            vec![down(), down(), down(), up()],
        )
        .await;

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(sink.delivered(), vec!["once"]);
    }

    #[tokio::test]
    async fn key_up_without_session_is_ignored() {
        let (recorder, starts) = MockRecorder::new(vec![]);
        let transcriber = Arc::new(MappedTranscriber::new(vec![]));

        let (sink, state) =
            run_scenario(recorder, Arc::clone(&transcriber), DeliveryOrder::Fifo, vec![up()]).await;

        assert_eq!(starts.load(Ordering::SeqCst), 0);
        assert_eq!(transcriber.calls(), 0);
        assert!(sink.delivered().is_empty());
        assert!(state.lock().unwrap().is_idle());
    }

    #[tokio::test]
    async fn too_short_recording_never_reaches_the_transcriber() {
        let (recorder, _) = MockRecorder::new(vec![Err(CaptureError::TooShort { secs: 0.4 })]);
        let transcriber = Arc::new(MappedTranscriber::new(vec![]));

        let (sink, state) = run_scenario(
            recorder,
            Arc::clone(&transcriber),
            DeliveryOrder::Fifo,
            vec![down(), up()],
        )
        .await;

        assert_eq!(transcriber.calls(), 0);
        assert!(sink.delivered().is_empty());
        assert!(state.lock().unwrap().is_idle());
    }

    #[tokio::test]
    async fn engine_error_drops_the_session() {
        let (recorder, _) = MockRecorder::new(vec![Ok(buffer(32_000))]);
        let transcriber = Arc::new(MappedTranscriber::new(vec![(
            32_000,
            Duration::ZERO,
            Err(TranscribeError::Engine("model exploded".into())),
        )]));

        let (sink, state) =
            run_scenario(recorder, transcriber, DeliveryOrder::Fifo, vec![down(), up()]).await;

        assert!(sink.delivered().is_empty());
        assert!(state.lock().unwrap().is_idle());
    }

    #[tokio::test]
    async fn no_speech_is_a_silent_noop() {
        let (recorder, _) = MockRecorder::new(vec![Ok(buffer(32_000))]);
        let transcriber = Arc::new(MappedTranscriber::new(vec![(
            32_000,
            Duration::ZERO,
            Err(TranscribeError::NoSpeech),
        )]));

        let (sink, state) =
            run_scenario(recorder, transcriber, DeliveryOrder::Fifo, vec![down(), up()]).await;

        assert!(sink.delivered().is_empty());
        assert!(state.lock().unwrap().is_idle());
    }

    #[tokio::test]
    async fn fifo_delivers_in_close_order_even_when_first_is_slow() {
        // Session 1 (32k samples) takes 300 ms, session 2 (16k) finishes in
        // 10 ms — the worker must still paste "first" before "second".
        let (recorder, _) = MockRecorder::new(vec![Ok(buffer(32_000)), Ok(buffer(16_000))]);
        let transcriber = Arc::new(MappedTranscriber::new(vec![
            (32_000, Duration::from_millis(300), Ok("first".into())),
            (16_000, Duration::from_millis(10), Ok("second".into())),
        ]));

        let (sink, state) = run_scenario(
            recorder,
            transcriber,
            DeliveryOrder::Fifo,
            vec![down(), up(), down(), up()],
        )
        .await;

        assert_eq!(sink.delivered(), vec!["first", "second"]);
        assert!(state.lock().unwrap().is_idle());
    }

    #[tokio::test]
    async fn latest_wins_drops_superseded_sessions() {
        let (recorder, _) = MockRecorder::new(vec![Ok(buffer(32_000)), Ok(buffer(16_000))]);
        let transcriber = Arc::new(MappedTranscriber::new(vec![
            (32_000, Duration::from_millis(300), Ok("first".into())),
            (16_000, Duration::from_millis(10), Ok("second".into())),
        ]));

        let (sink, state) = run_scenario(
            recorder,
            transcriber,
            DeliveryOrder::LatestWins,
            vec![down(), up(), down(), up()],
        )
        .await;

        assert_eq!(sink.delivered(), vec!["second"]);
        assert!(state.lock().unwrap().is_idle());
    }

    #[tokio::test]
    async fn can_record_while_previous_session_transcribes() {
        let (recorder, starts) = MockRecorder::new(vec![Ok(buffer(32_000)), Ok(buffer(16_000))]);
        let transcriber = Arc::new(MappedTranscriber::new(vec![
            (32_000, Duration::from_millis(200), Ok("slow".into())),
            (16_000, Duration::ZERO, Ok("fast".into())),
        ]));

        // Second key down arrives while session 1 is still transcribing.
        let (sink, _) = run_scenario(
            recorder,
            transcriber,
            DeliveryOrder::Fifo,
            vec![down(), up(), down(), up()],
        )
        .await;

        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(sink.delivered(), vec!["slow", "fast"]);
    }
}
