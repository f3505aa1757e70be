//! Dedicated OS-thread trigger-key listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`TriggerKeyListener`] owns that thread and a stop flag; dropping it sets
//! the flag so the callback silently ignores further events.
//!
//! # Normalization guarantees
//!
//! * Only events for the configured trigger key are forwarded.
//! * OS key-repeat `Down`s while the key is held are suppressed, so the
//!   channel never carries two consecutive `Down`s without an `Up` between.
//! * Timestamps are strictly increasing.
//!
//! # Failure mode
//!
//! When the OS refuses the event stream (missing input permissions, no
//! display server), `rdev::listen` returns an error. The listener thread
//! logs it and exits, dropping its channel sender — the orchestrator's event
//! loop observes the closed channel and the process shuts down. Opening the
//! key-event source is not retried.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**. Setting the stop flag
//! prevents events from being forwarded, but the OS thread itself will remain
//! blocked in the rdev event loop until the process exits. This is safe and
//! expected — rdev holds no resources that need explicit cleanup.

use std::cell::Cell;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::{KeyEvent, KeyEventKind};

// ---------------------------------------------------------------------------
// TriggerKeyListener
// ---------------------------------------------------------------------------

/// Handle to a running trigger-key listener thread.
///
/// Construct one with [`TriggerKeyListener::start`]. Drop it to stop
/// forwarding events.
pub struct TriggerKeyListener {
    /// Shared stop flag — set `true` on [`Drop`].
    stop: Arc<AtomicBool>,
    /// The thread handle. Kept alive so the thread is not detached
    /// prematurely; we never `join` it because `rdev::listen` never returns
    /// on success.
    _thread: std::thread::JoinHandle<()>,
}

impl TriggerKeyListener {
    /// Spawn a dedicated OS thread that watches global key events and
    /// forwards a normalized [`KeyEvent`] on `tx` whenever `trigger` goes
    /// down or up.
    ///
    /// The background thread uses `blocking_send` so it works correctly from
    /// a non-async context. When the channel is full the send blocks the
    /// listener thread briefly rather than dropping the event — the
    /// orchestrator must never miss a transition.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread (extremely unlikely).
    pub fn start(trigger: rdev::Key, tx: mpsc::Sender<KeyEvent>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("trigger-key-listener".into())
            .spawn(move || {
                // Callback-local state. Cells because rdev only promises to
                // call us from a single thread but takes the closure by
                // shared reference on some platforms.
                let held = Cell::new(false);
                let last_emit = Cell::new(None::<Instant>);

                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }

                    let kind = match event.event_type {
                        rdev::EventType::KeyPress(k) if k == trigger => {
                            // Key-repeat while held reports as repeated
                            // presses — forward only the first.
                            if held.replace(true) {
                                return;
                            }
                            KeyEventKind::Down
                        }
                        rdev::EventType::KeyRelease(k) if k == trigger => {
                            held.set(false);
                            KeyEventKind::Up
                        }
                        _ => return,
                    };

                    let at = next_timestamp(&last_emit);
                    let _ = tx.blocking_send(KeyEvent::new(kind, at));
                });

                if let Err(e) = result {
                    log::error!(
                        "trigger-key-listener: cannot open the key event source \
                         (check input permissions): {e:?}"
                    );
                    // Returning drops `tx`; the orchestrator sees the channel
                    // close and treats the event source as unavailable.
                }
            })
            .expect("failed to spawn trigger-key-listener thread");

        Self {
            stop,
            _thread: thread,
        }
    }
}

impl Drop for TriggerKeyListener {
    /// Set the stop flag so the rdev callback stops forwarding events.
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Take a monotonic timestamp that is strictly greater than the previous one.
///
/// `Instant::now()` is monotonic but not strictly increasing; two events
/// observed within the clock resolution would otherwise tie.
fn next_timestamp(last: &Cell<Option<Instant>>) -> Instant {
    let mut now = Instant::now();
    if let Some(prev) = last.get() {
        if now <= prev {
            now = prev + Duration::from_nanos(1);
        }
    }
    last.set(Some(now));
    now
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
