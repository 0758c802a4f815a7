use std::{fmt, sync::Arc, time::Instant};

use tracing::debug;

use crate::{
    action::{Action, MetricValue, SampleRate},
    dispatcher::{DispatchError, Dispatcher},
    telemetry::TelemetrySnapshot,
};

/// A StatsD client.
///
/// Every method hands a metric action to a background dispatcher and returns immediately: no I/O is ever performed on
/// the calling thread. Methods return `true` if the action was queued, and `false` if it was dropped, either because
/// the sample rate is invalid or because the queue is full.
///
/// Clones share the same dispatcher. When the last clone is dropped, the dispatcher shuts down and sends every metric
/// still queued, including metrics recorded after an explicit [`stop`](StatsdClient::stop).
#[derive(Clone)]
pub struct StatsdClient {
    dispatcher: Arc<Dispatcher>,
}

impl StatsdClient {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        StatsdClient { dispatcher: Arc::new(dispatcher) }
    }

    /// Adjusts a counter by `delta`, or a gauge when `gauge` is `true`.
    pub fn increment<S, V>(&self, stat: S, delta: V, rate: f64, gauge: bool) -> bool
    where
        S: Into<String>,
        V: Into<MetricValue>,
    {
        self.delta(stat.into(), delta.into(), rate, gauge)
    }

    /// Adjusts a counter by `-delta`, or a gauge when `gauge` is `true`.
    pub fn decrement<S, V>(&self, stat: S, delta: V, rate: f64, gauge: bool) -> bool
    where
        S: Into<String>,
        V: Into<MetricValue>,
    {
        let delta: MetricValue = delta.into();
        self.delta(stat.into(), -delta, rate, gauge)
    }

    /// Increments a counter by one.
    pub fn incr<S: Into<String>>(&self, stat: S) -> bool {
        self.increment(stat, 1, 1.0, false)
    }

    /// Decrements a counter by one.
    pub fn decr<S: Into<String>>(&self, stat: S) -> bool {
        self.decrement(stat, 1, 1.0, false)
    }

    /// Adjusts several counters by the same `delta`.
    ///
    /// Returns the number of counters whose update was queued.
    pub fn update_stats<I, S, V>(&self, stats: I, delta: V, rate: f64) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        V: Into<MetricValue>,
    {
        let delta = delta.into();
        stats
            .into_iter()
            .map(|stat| self.delta(stat.into(), delta, rate, false))
            .filter(|queued| *queued)
            .count()
    }

    /// Sets a gauge to `value`.
    pub fn set<S, V>(&self, stat: S, value: V, rate: f64) -> bool
    where
        S: Into<String>,
        V: Into<MetricValue>,
    {
        let stat = stat.into();
        let Some(sample_rate) = checked_sample_rate(&stat, rate) else { return false };
        self.enqueue(Action::GaugeSet { stat, value: value.into(), sample_rate })
    }

    /// Records `value` as a member of a set.
    pub fn distinct<S, M>(&self, stat: S, value: M) -> bool
    where
        S: Into<String>,
        M: fmt::Display,
    {
        self.enqueue(Action::Distinct {
            stat: stat.into(),
            member: value.to_string(),
            sample_rate: SampleRate::ALWAYS,
        })
    }

    /// Records a duration, in milliseconds.
    pub fn timing<S: Into<String>>(&self, stat: S, millis: f64, rate: f64) -> bool {
        let stat = stat.into();
        let Some(sample_rate) = checked_sample_rate(&stat, rate) else { return false };
        self.enqueue(Action::Timing { stat, millis, sample_rate })
    }

    /// Records the time elapsed since `start`, in milliseconds.
    pub fn timing_since<S: Into<String>>(&self, stat: S, start: Instant, rate: f64) -> bool {
        self.timing(stat, start.elapsed().as_secs_f64() * 1000.0, rate)
    }

    /// Pushes a raw action to the dispatcher queue.
    ///
    /// Enqueuing [`Action::Stop`] makes the dispatcher exit once the actions ahead of it have been processed; use
    /// [`StatsdClient::run`] to start it again.
    pub fn enqueue(&self, action: Action) -> bool {
        self.dispatcher.enqueue(action)
    }

    /// Starts the background dispatcher if it is not already running.
    ///
    /// # Errors
    ///
    /// If the dispatcher thread cannot be spawned, or if a previous dispatcher thread panicked, an error is returned.
    pub fn run(&self) -> Result<(), DispatchError> {
        self.dispatcher.run()
    }

    /// Stops the background dispatcher once every metric queued so far has been sent.
    ///
    /// Metrics recorded after this call are queued, but not sent until [`StatsdClient::run`] is called.
    ///
    /// # Errors
    ///
    /// If the dispatcher thread panicked, an error is returned.
    pub fn stop(&self) -> Result<(), DispatchError> {
        self.dispatcher.stop()
    }

    /// Returns `true` if the background dispatcher is running.
    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Returns a snapshot of the client telemetry.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.dispatcher.telemetry().snapshot()
    }

    fn delta(&self, stat: String, value: MetricValue, rate: f64, gauge: bool) -> bool {
        let Some(sample_rate) = checked_sample_rate(&stat, rate) else { return false };
        self.enqueue(Action::Delta { stat, value, sample_rate, gauge })
    }
}

fn checked_sample_rate(stat: &str, rate: f64) -> Option<SampleRate> {
    let sample_rate = SampleRate::new(rate);
    if sample_rate.is_none() {
        debug!(metric_name = stat, rate, "Dropping metric with invalid sample rate.");
    }
    sample_rate
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdClient").field("running", &self.is_running()).finish()
    }
}
