//! # Idle-Detection Notifier
//!
//! Raises a "benchmark finished" event once traffic goes quiet after an
//! explicit arm signal.
//!
//! ## State Machine
//!
//! ```text
//!  WAITING_FOR_ARM ──arm()──▶ ARMED (polling) ──idle > threshold──▶ FINISHED
//!        ▲                                                            │
//!        └──────────────── on_finished() returns ─────────────────────┘
//! ```
//!
//! ## Threading
//!
//! One background thread owns the state machine. Request handlers only touch
//! the last-request timestamp, an `AtomicU64` holding microseconds since the
//! notifier was created, so [`FinishNotifier::on_request`] is a single relaxed
//! store and never blocks. A slightly stale read on the polling side only
//! shifts detection by one poll interval.
//!
//! The arm signal travels over a bounded channel of capacity one. Arming while
//! a signal is already pending is a no-op (the pending cycle covers it), so
//! [`FinishNotifier::arm`] never blocks and never loses the request.
//!
//! The finished callback runs on the polling thread. Polling does not resume
//! until it returns, and the thread then waits for the next arm signal; it
//! never re-arms by itself. A panic inside the callback takes the thread down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, tick, Receiver, Sender, TrySendError};
use log::{debug, info};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(3);

/// Timing knobs for idle detection.
#[derive(Debug, Clone, Copy)]
pub struct NotifierConfig {
    /// How often the polling thread checks the last-request timestamp.
    pub poll_interval: Duration,
    /// Request-free time after which the armed run counts as finished.
    pub idle_threshold: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}

/// Last-request clock shared between request handlers and the poller.
#[derive(Debug)]
struct RequestClock {
    epoch: Instant,
    last_request_micros: AtomicU64,
}

impl RequestClock {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_request_micros: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_micros(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn touch(&self) {
        self.last_request_micros.store(self.now_micros(), Ordering::Relaxed);
    }

    /// Time since the last request, or since creation if none arrived yet.
    fn idle_for(&self) -> Duration {
        let last = self.last_request_micros.load(Ordering::Relaxed);
        Duration::from_micros(self.now_micros().saturating_sub(last))
    }
}

/// Handle to a running idle detector. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FinishNotifier {
    clock: Arc<RequestClock>,
    arm_tx: Sender<()>,
}

impl FinishNotifier {
    /// Spawn the polling thread and return a handle to it.
    ///
    /// `on_finished` is invoked once per armed cycle, on the polling thread.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn<F>(config: NotifierConfig, on_finished: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let clock = Arc::new(RequestClock::new());
        let (arm_tx, arm_rx) = bounded(1);

        let poller_clock = Arc::clone(&clock);
        thread::Builder::new()
            .name("finish-notifier".to_string())
            .spawn(move || run_detection_loop(&config, &poller_clock, &arm_rx, on_finished))?;

        Ok(Self { clock, arm_tx })
    }

    /// Signal that a benchmark run is beginning. Never blocks.
    pub fn arm(&self) {
        match self.arm_tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => debug!("arm signal already pending"),
            Err(TrySendError::Disconnected(())) => debug!("notifier thread is gone, arm ignored"),
        }
    }

    /// Record an inbound request. O(1), lock-free.
    pub fn on_request(&self) {
        self.clock.touch();
    }

    /// Time since the last recorded request.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.clock.idle_for()
    }
}

fn run_detection_loop<F>(
    config: &NotifierConfig,
    clock: &RequestClock,
    arm_rx: &Receiver<()>,
    mut on_finished: F,
) where
    F: FnMut(),
{
    loop {
        info!("wait for starting benchmark");
        if arm_rx.recv().is_err() {
            debug!("all notifier handles dropped, stopping detection");
            return;
        }
        info!("start benchmark");

        let ticker = tick(config.poll_interval);
        loop {
            if ticker.recv().is_err() {
                return;
            }
            if clock.idle_for() > config.idle_threshold {
                break;
            }
        }

        info!("finished benchmark");
        on_finished();
    }
}
