use std::{fmt, ops::Neg};

/// A numeric metric value.
///
/// Integers and floating-point values are kept apart so that integer deltas are written without a fractional part on
/// the wire.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricValue {
    /// A signed integer value.
    Integer(i64),

    /// A floating-point value.
    FloatingPoint(f64),
}

impl MetricValue {
    /// Returns `true` if the value is negative.
    ///
    /// Negative zero is not considered negative.
    pub fn is_negative(self) -> bool {
        match self {
            MetricValue::Integer(v) => v < 0,
            MetricValue::FloatingPoint(v) => v < 0.0,
        }
    }

    /// Returns `true` if the value can be represented on the wire.
    pub fn is_finite(self) -> bool {
        match self {
            MetricValue::Integer(_) => true,
            MetricValue::FloatingPoint(v) => v.is_finite(),
        }
    }
}

impl Neg for MetricValue {
    type Output = MetricValue;

    fn neg(self) -> Self::Output {
        match self {
            MetricValue::Integer(v) => MetricValue::Integer(v.saturating_neg()),
            MetricValue::FloatingPoint(v) => MetricValue::FloatingPoint(-v),
        }
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for MetricValue {
                fn from(value: $ty) -> Self {
                    MetricValue::Integer(i64::from(value))
                }
            }
        )+
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        MetricValue::FloatingPoint(f64::from(value))
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::FloatingPoint(value)
    }
}

/// Probability that a metric is sent, in the range `(0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct SampleRate(f64);

impl SampleRate {
    /// Sample rate that sends every metric.
    pub const ALWAYS: SampleRate = SampleRate(1.0);

    /// Creates a `SampleRate` from a raw rate.
    ///
    /// Rates above 1 are clamped to 1. Returns `None` if the rate is zero, negative, or NaN, as such a metric could
    /// never be sent.
    pub fn new(rate: f64) -> Option<Self> {
        if rate > 1.0 {
            Some(SampleRate::ALWAYS)
        } else if rate > 0.0 {
            Some(SampleRate(rate))
        } else {
            None
        }
    }

    /// Returns the raw rate.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Returns `true` if metrics at this rate go through sampling.
    pub fn is_sampled(self) -> bool {
        self.0 < 1.0
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        SampleRate::ALWAYS
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single request to emit a metric, or to stop the dispatcher.
///
/// Actions are created by the client and consumed, in order, by the dispatcher.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Adjust a counter, or a gauge when `gauge` is `true`, by a signed delta.
    Delta {
        /// Metric name.
        stat: String,
        /// Signed delta.
        value: MetricValue,
        /// Sample rate.
        sample_rate: SampleRate,
        /// Whether the delta applies to a gauge rather than a counter.
        gauge: bool,
    },

    /// Set a gauge to an absolute value.
    GaugeSet {
        /// Metric name.
        stat: String,
        /// Absolute value.
        value: MetricValue,
        /// Sample rate.
        sample_rate: SampleRate,
    },

    /// Record a member of a set.
    Distinct {
        /// Metric name.
        stat: String,
        /// Set member, as it will appear on the wire.
        member: String,
        /// Sample rate.
        sample_rate: SampleRate,
    },

    /// Record a duration, in milliseconds.
    Timing {
        /// Metric name.
        stat: String,
        /// Duration in milliseconds.
        millis: f64,
        /// Sample rate.
        sample_rate: SampleRate,
    },

    /// Stop the dispatcher once every action enqueued before this one has been processed.
    Stop,
}

impl Action {
    /// Returns the metric name, or `None` for [`Action::Stop`].
    pub fn stat(&self) -> Option<&str> {
        match self {
            Action::Delta { stat, .. }
            | Action::GaugeSet { stat, .. }
            | Action::Distinct { stat, .. }
            | Action::Timing { stat, .. } => Some(stat),
            Action::Stop => None,
        }
    }

    /// Returns the sample rate, or `None` for [`Action::Stop`].
    pub fn sample_rate(&self) -> Option<SampleRate> {
        match self {
            Action::Delta { sample_rate, .. }
            | Action::GaugeSet { sample_rate, .. }
            | Action::Distinct { sample_rate, .. }
            | Action::Timing { sample_rate, .. } => Some(*sample_rate),
            Action::Stop => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricValue, SampleRate};

    #[test]
    fn sample_rate_bounds() {
        assert_eq!(SampleRate::new(1.0), Some(SampleRate::ALWAYS));
        assert_eq!(SampleRate::new(7.5), Some(SampleRate::ALWAYS));
        assert_eq!(SampleRate::new(0.25).map(SampleRate::value), Some(0.25));
        assert_eq!(SampleRate::new(0.0), None);
        assert_eq!(SampleRate::new(-0.5), None);
        assert_eq!(SampleRate::new(f64::NAN), None);

        assert!(!SampleRate::ALWAYS.is_sampled());
        assert!(SampleRate::new(0.5).unwrap().is_sampled());
    }

    #[test]
    fn negation() {
        assert_eq!(-MetricValue::from(5), MetricValue::Integer(-5));
        assert_eq!(-MetricValue::Integer(i64::MIN), MetricValue::Integer(i64::MAX));
        assert_eq!(-MetricValue::from(1.5), MetricValue::FloatingPoint(-1.5));
    }

    #[test]
    fn conversions() {
        assert_eq!(MetricValue::from(42u8), MetricValue::Integer(42));
        assert_eq!(MetricValue::from(u64::MAX), MetricValue::Integer(i64::MAX));
        assert_eq!(MetricValue::from(2.5f32), MetricValue::FloatingPoint(2.5));

        assert!(MetricValue::from(-1).is_negative());
        assert!(!MetricValue::from(-0.0).is_negative());
        assert!(!MetricValue::from(f64::INFINITY).is_finite());
    }
}
