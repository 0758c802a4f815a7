use crate::action::{MetricValue, SampleRate};

#[derive(Clone, Copy)]
enum MetricType {
    Counter,
    Gauge,
    Timing,
    Set,
}

impl MetricType {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            MetricType::Counter => b"|c",
            MetricType::Gauge => b"|g",
            MetricType::Timing => b"|ms",
            MetricType::Set => b"|s",
        }
    }
}

struct MetricValueFormatter {
    int_writer: itoa::Buffer,
    float_writer: ryu::Buffer,
}

impl MetricValueFormatter {
    fn new() -> Self {
        Self { int_writer: itoa::Buffer::new(), float_writer: ryu::Buffer::new() }
    }

    fn format(&mut self, value: MetricValue) -> &str {
        match value {
            MetricValue::Integer(v) => self.int_writer.format(v),
            // Negative zero would otherwise be read as a delta by the server.
            MetricValue::FloatingPoint(v) if v == 0.0 => self.float_writer.format(0.0),
            MetricValue::FloatingPoint(v) => self.float_writer.format(v),
        }
    }
}

/// Encodes metric actions into StatsD payloads.
///
/// Each `write_*` call replaces the current payload with the encoding of a single metric, which is made up of one
/// line, or two newline-separated lines when a gauge has to be reset before being set to a negative value. Payloads
/// never carry a trailing newline.
///
/// When a prefix is configured, every metric name is written as `<prefix>.<stat>`.
pub(crate) struct PayloadWriter {
    prefix: Option<String>,
    payload_buf: Vec<u8>,
    formatter: MetricValueFormatter,
}

impl PayloadWriter {
    /// Creates a new `PayloadWriter`, with an optional metric name prefix.
    ///
    /// An empty prefix is the same as no prefix at all.
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()),
            payload_buf: Vec::new(),
            formatter: MetricValueFormatter::new(),
        }
    }

    /// Returns the current payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload_buf
    }

    /// Writes a counter delta payload.
    ///
    /// Returns `false`, leaving the payload empty, if the value cannot be encoded.
    pub fn write_counter(&mut self, stat: &str, delta: MetricValue, rate: SampleRate) -> bool {
        self.write_single(stat, None, delta, MetricType::Counter, rate)
    }

    /// Writes a gauge delta payload.
    ///
    /// The delta always carries an explicit sign so that the server does not treat it as an absolute value.
    pub fn write_gauge_delta(&mut self, stat: &str, delta: MetricValue, rate: SampleRate) -> bool {
        let sign = if delta.is_negative() { None } else { Some(b'+') };
        self.write_single(stat, sign, delta, MetricType::Gauge, rate)
    }

    /// Writes an absolute gauge payload.
    ///
    /// StatsD has no way to set a gauge to a negative value directly, since a leading minus sign marks a delta. For
    /// negative values, the gauge is first reset to zero and then adjusted by the value, in the same payload.
    pub fn write_gauge(&mut self, stat: &str, value: MetricValue, rate: SampleRate) -> bool {
        self.payload_buf.clear();
        if !value.is_finite() {
            return false;
        }

        let Self { prefix, payload_buf, formatter } = self;
        if value.is_negative() {
            write_line(payload_buf, prefix.as_deref(), stat, None, "0", MetricType::Gauge, rate);
        }

        let value_str = formatter.format(value);
        write_line(payload_buf, prefix.as_deref(), stat, None, value_str, MetricType::Gauge, rate);
        true
    }

    /// Writes a set member payload.
    pub fn write_set(&mut self, stat: &str, member: &str, rate: SampleRate) -> bool {
        self.payload_buf.clear();

        let Self { prefix, payload_buf, .. } = self;
        write_line(payload_buf, prefix.as_deref(), stat, None, member, MetricType::Set, rate);
        true
    }

    /// Writes a timing payload, with the duration given in milliseconds.
    pub fn write_timing(&mut self, stat: &str, millis: f64, rate: SampleRate) -> bool {
        self.write_single(stat, None, MetricValue::FloatingPoint(millis), MetricType::Timing, rate)
    }

    fn write_single(
        &mut self,
        stat: &str,
        sign: Option<u8>,
        value: MetricValue,
        metric_type: MetricType,
        rate: SampleRate,
    ) -> bool {
        self.payload_buf.clear();
        if !value.is_finite() {
            return false;
        }

        let Self { prefix, payload_buf, formatter } = self;
        let value_str = formatter.format(value);
        write_line(payload_buf, prefix.as_deref(), stat, sign, value_str, metric_type, rate);
        true
    }
}

fn write_line(
    buf: &mut Vec<u8>,
    prefix: Option<&str>,
    stat: &str,
    sign: Option<u8>,
    value: &str,
    metric_type: MetricType,
    rate: SampleRate,
) {
    if !buf.is_empty() {
        buf.push(b'\n');
    }

    if let Some(prefix) = prefix {
        buf.extend_from_slice(prefix.as_bytes());
        buf.push(b'.');
    }

    buf.extend_from_slice(stat.as_bytes());
    buf.push(b':');
    if let Some(sign) = sign {
        buf.push(sign);
    }
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(metric_type.as_bytes());

    // A rate of 1 is implied, so it's only written for sampled metrics.
    if rate.is_sampled() {
        let mut float_writer = ryu::Buffer::new();
        buf.extend_from_slice(b"|@");
        buf.extend_from_slice(float_writer.format(rate.value()).as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use proptest::{prelude::*, proptest};

    use super::PayloadWriter;
    use crate::action::{MetricValue, SampleRate};

    fn rate(r: f64) -> SampleRate {
        SampleRate::new(r).unwrap()
    }

    fn payload_string(writer: &PayloadWriter) -> &str {
        std::str::from_utf8(writer.payload()).unwrap()
    }

    #[test]
    fn counter() {
        // Cases are defined as: prefix, stat, delta, sample rate, expected output.
        let cases = [
            (None, "foo.bar", MetricValue::Integer(5), 1.0, "foo.bar:5|c"),
            (None, "foo.bar", MetricValue::Integer(-5), 1.0, "foo.bar:-5|c"),
            (None, "foo.bar", MetricValue::Integer(1), 0.5, "foo.bar:1|c|@0.5"),
            (None, "foo.bar", MetricValue::FloatingPoint(2.5), 1.0, "foo.bar:2.5|c"),
            (Some("app"), "foo.bar", MetricValue::Integer(130), 0.1, "app.foo.bar:130|c|@0.1"),
            (Some(""), "foo.bar", MetricValue::Integer(1), 1.0, "foo.bar:1|c"),
        ];

        for (prefix, stat, delta, sample_rate, expected) in cases {
            let mut writer = PayloadWriter::new(prefix.map(String::from));
            assert!(writer.write_counter(stat, delta, rate(sample_rate)));
            assert_eq!(payload_string(&writer), expected);
        }
    }

    #[test]
    fn gauge_delta() {
        // Cases are defined as: prefix, stat, delta, sample rate, expected output.
        let cases = [
            (None, "foo.bar", MetricValue::Integer(4), 1.0, "foo.bar:+4|g"),
            (None, "foo.bar", MetricValue::Integer(-4), 1.0, "foo.bar:-4|g"),
            (None, "foo.bar", MetricValue::Integer(0), 1.0, "foo.bar:+0|g"),
            (None, "foo.bar", MetricValue::FloatingPoint(-0.0), 1.0, "foo.bar:+0.0|g"),
            (None, "foo.bar", MetricValue::FloatingPoint(1.5), 0.25, "foo.bar:+1.5|g|@0.25"),
            (Some("app"), "foo.bar", MetricValue::Integer(-130), 1.0, "app.foo.bar:-130|g"),
        ];

        for (prefix, stat, delta, sample_rate, expected) in cases {
            let mut writer = PayloadWriter::new(prefix.map(String::from));
            assert!(writer.write_gauge_delta(stat, delta, rate(sample_rate)));
            assert_eq!(payload_string(&writer), expected);
        }
    }

    #[test]
    fn gauge() {
        // Cases are defined as: prefix, stat, value, sample rate, expected output.
        let cases = [
            (None, "my.gauge", MetricValue::Integer(7), 1.0, "my.gauge:7|g"),
            (None, "my.gauge", MetricValue::Integer(0), 1.0, "my.gauge:0|g"),
            (None, "my.gauge", MetricValue::Integer(-3), 1.0, "my.gauge:0|g\nmy.gauge:-3|g"),
            (None, "my.gauge", MetricValue::FloatingPoint(42.0), 1.0, "my.gauge:42.0|g"),
            (None, "my.gauge", MetricValue::FloatingPoint(-0.0), 1.0, "my.gauge:0.0|g"),
            (None, "my.gauge", MetricValue::Integer(4100), 0.1, "my.gauge:4100|g|@0.1"),
            (
                None,
                "my.gauge",
                MetricValue::FloatingPoint(-2.5),
                0.5,
                "my.gauge:0|g|@0.5\nmy.gauge:-2.5|g|@0.5",
            ),
            (Some("app"), "my.gauge", MetricValue::Integer(-1), 1.0, "app.my.gauge:0|g\napp.my.gauge:-1|g"),
        ];

        for (prefix, stat, value, sample_rate, expected) in cases {
            let mut writer = PayloadWriter::new(prefix.map(String::from));
            assert!(writer.write_gauge(stat, value, rate(sample_rate)));
            assert_eq!(payload_string(&writer), expected);
        }
    }

    #[test]
    fn set_and_timing() {
        let mut writer = PayloadWriter::new(None);
        assert!(writer.write_set("users.unique", "ferris", SampleRate::ALWAYS));
        assert_eq!(payload_string(&writer), "users.unique:ferris|s");

        assert!(writer.write_timing("my.timer", 400.0, SampleRate::ALWAYS));
        assert_eq!(payload_string(&writer), "my.timer:400.0|ms");

        assert!(writer.write_timing("my.timer", 12.75, rate(0.5)));
        assert_eq!(payload_string(&writer), "my.timer:12.75|ms|@0.5");

        let mut writer = PayloadWriter::new(Some("app".to_string()));
        assert!(writer.write_set("users.unique", "42", SampleRate::ALWAYS));
        assert_eq!(payload_string(&writer), "app.users.unique:42|s");
    }

    #[test]
    fn non_finite_values() {
        let mut writer = PayloadWriter::new(None);
        assert!(writer.write_counter("ok", MetricValue::Integer(1), SampleRate::ALWAYS));

        assert!(!writer.write_counter("bad", MetricValue::FloatingPoint(f64::NAN), SampleRate::ALWAYS));
        assert!(writer.payload().is_empty());

        assert!(!writer.write_gauge("bad", MetricValue::FloatingPoint(f64::NEG_INFINITY), SampleRate::ALWAYS));
        assert!(writer.payload().is_empty());

        assert!(!writer.write_timing("bad", f64::INFINITY, SampleRate::ALWAYS));
        assert!(writer.payload().is_empty());
    }

    proptest! {
        #[test]
        fn gauge_lines_are_well_formed(stat in "[a-z]{1,8}(\\.[a-z]{1,8}){0,3}", value in any::<i64>(), sampled in any::<bool>()) {
            let sample_rate = if sampled { rate(0.5) } else { SampleRate::ALWAYS };
            let mut writer = PayloadWriter::new(Some("app".to_string()));
            prop_assert!(writer.write_gauge(&stat, MetricValue::Integer(value), sample_rate));

            let payload = std::str::from_utf8(writer.payload()).unwrap();
            let lines = payload.split('\n').collect::<Vec<_>>();
            prop_assert_eq!(lines.len(), if value < 0 { 2 } else { 1 });

            let expected_name = format!("app.{}", stat);
            for line in &lines {
                let (name, rest) = line.split_once(':').unwrap();
                prop_assert_eq!(name, expected_name.as_str());
                prop_assert!(rest.contains("|g"));
                prop_assert_eq!(rest.ends_with("|@0.5"), sampled);
            }

            if value < 0 {
                let reset = format!("{}:0|g", expected_name);
                prop_assert!(lines[0].starts_with(&reset));
            }
        }
    }
}
