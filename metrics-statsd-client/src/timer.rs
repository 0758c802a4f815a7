use quanta::{Clock, Instant};
use thiserror::Error;
use tracing::debug;

use crate::client::StatsdClient;

/// Errors caused by using a [`Timer`] out of order.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// The timer was stopped without being started.
    #[error("timer has not been started")]
    NotStarted,

    /// The timing was sent before the timer was stopped.
    #[error("timer has not been stopped")]
    NotStopped,

    /// The timing was already sent.
    #[error("timing has already been sent")]
    AlreadySent,
}

/// Measures wall-clock time and records it as a timing metric.
///
/// A timer moves from started, to stopped, to sent. It can be driven by hand with [`start`](Timer::start),
/// [`stop`](Timer::stop) and [`send`](Timer::send), or used through [`guard`](Timer::guard),
/// [`measure`](Timer::measure) and [`decorate`](Timer::decorate), which always stop and send the timer when the
/// measured code finishes, even if it panics.
///
/// Timings are sent through the process-wide client unless a client is given with [`with_client`](Timer::with_client).
///
/// ```no_run
/// # use metrics_statsd_client::Timer;
/// {
///     let _guard = Timer::new("db.query").guard();
///     // run the query
/// }
///
/// let timed_parse = Timer::new("request.parse").decorate(|input: &str| input.len());
/// timed_parse("GET / HTTP/1.1");
/// ```
#[derive(Clone)]
pub struct Timer {
    stat: String,
    sample_rate: f64,
    client: Option<StatsdClient>,
    clock: Clock,
    started_at: Option<Instant>,
    elapsed_ms: Option<f64>,
    sent: bool,
}

impl Timer {
    /// Creates a new `Timer` for the given metric name.
    pub fn new<S: Into<String>>(stat: S) -> Self {
        Timer {
            stat: stat.into(),
            sample_rate: 1.0,
            client: None,
            clock: Clock::new(),
            started_at: None,
            elapsed_ms: None,
            sent: false,
        }
    }

    /// Set the sample rate used when sending the timing.
    ///
    /// Defaults to 1.
    #[must_use]
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Send the timing through the given client instead of the process-wide one.
    #[must_use]
    pub fn with_client(mut self, client: StatsdClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Measure time with the given clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Starts the timer, discarding any previous measurement.
    pub fn start(&mut self) -> &mut Self {
        self.started_at = Some(self.clock.now());
        self.elapsed_ms = None;
        self.sent = false;
        self
    }

    /// Stops the timer and returns the elapsed time in milliseconds.
    ///
    /// When `send` is `true`, the timing is sent right away; see [`Timer::send`] for what happens when the client drops
    /// it.
    ///
    /// # Errors
    ///
    /// If the timer was not started, [`TimerError::NotStarted`] is returned.
    pub fn stop(&mut self, send: bool) -> Result<f64, TimerError> {
        let started_at = self.started_at.take().ok_or(TimerError::NotStarted)?;
        let elapsed_ms = self.clock.now().duration_since(started_at).as_nanos() as f64 / 1_000_000.0;
        self.elapsed_ms = Some(elapsed_ms);

        if send {
            self.send()?;
        }

        Ok(elapsed_ms)
    }

    /// Sends the measured timing.
    ///
    /// Returns `true` if the timing was queued, and `false` if the client dropped it, because the sample rate is
    /// invalid or the queue is full. The measurement counts as sent either way, and is not sent again.
    ///
    /// # Errors
    ///
    /// If the timer was not stopped, [`TimerError::NotStopped`] is returned. If the timing was already sent,
    /// [`TimerError::AlreadySent`] is returned.
    pub fn send(&mut self) -> Result<bool, TimerError> {
        let elapsed_ms = self.elapsed_ms.ok_or(TimerError::NotStopped)?;
        if self.sent {
            return Err(TimerError::AlreadySent);
        }

        let queued = match &self.client {
            Some(client) => client.timing(self.stat.as_str(), elapsed_ms, self.sample_rate),
            None => crate::global::timing(self.stat.as_str(), elapsed_ms, self.sample_rate),
        };
        if !queued {
            debug!(metric_name = self.stat.as_str(), elapsed_ms, "Timing was dropped by the client.");
        }

        self.sent = true;
        Ok(queued)
    }

    /// Returns the last measured time in milliseconds, if the timer was stopped.
    pub fn elapsed_ms(&self) -> Option<f64> {
        self.elapsed_ms
    }

    /// Returns `true` if the last measurement was sent.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Starts the timer and returns a guard that stops it and sends the timing when dropped.
    pub fn guard(mut self) -> TimerGuard {
        self.start();
        TimerGuard { timer: self }
    }

    /// Runs `f`, then sends how long it took.
    pub fn measure<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.clone().guard();
        f()
    }

    /// Wraps `f` so that every call to it is timed and sent.
    ///
    /// The timing is sent once the call completes, whatever its outcome. Functions taking several arguments can be
    /// wrapped by taking them as a tuple.
    pub fn decorate<A, R, F>(self, f: F) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        move |arg| {
            let _guard = self.clone().guard();
            f(arg)
        }
    }
}

/// Stops a [`Timer`] and sends its timing when dropped.
///
/// The guard runs exactly once, including when the scope is left by unwinding.
#[must_use = "the timer stops as soon as the guard is dropped"]
pub struct TimerGuard {
    timer: Timer,
}

impl TimerGuard {
    /// Returns the guarded timer.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if let Err(e) = self.timer.stop(true) {
            debug!(error = %e, metric_name = self.timer.stat.as_str(), "Failed to send timing.");
        }
    }
}
