//! A non-blocking client for sending metrics to a [StatsD][statsd] server.
//!
//! [statsd]: https://github.com/statsd/statsd/blob/master/docs/metric_types.md
//!
//! # Usage
//!
//! The simplest way to send metrics is through the free functions, which use a process-wide client:
//!
//! ```no_run
//! // Counters, optionally sampled, optionally applied to a gauge instead.
//! metrics_statsd_client::incr("requests");
//! metrics_statsd_client::increment("bytes.in", 512, 1.0, false);
//! metrics_statsd_client::decrement("connections", 1, 1.0, true);
//!
//! // Gauges, sets and timings.
//! metrics_statsd_client::set("queue.depth", 42, 1.0);
//! metrics_statsd_client::distinct("users", "ferris");
//! metrics_statsd_client::timing("db.query", 12.5, 0.1);
//! ```
//!
//! Unless a client was installed beforehand, the process-wide client is built on first use from the `STATSD_HOST`,
//! `STATSD_PORT` and `STATSD_PREFIX` environment variables. To configure it explicitly, install one:
//!
//! ```no_run
//! # use metrics_statsd_client::StatsdBuilder;
//! StatsdBuilder::default()
//!     .with_host("metrics.example.com")
//!     .with_prefix("my_app")
//!     .install()
//!     .expect("failed to install StatsD client");
//! ```
//!
//! Standalone clients can be built with [`StatsdBuilder::build`] as well, which is useful for sending to several
//! servers, or for tests.
//!
//! # Delivery
//!
//! Recording a metric never blocks and never fails because of the network: metrics are pushed to a queue, and a
//! single background thread encodes them and sends one UDP datagram per metric, in order. Delivery is best-effort:
//! payloads that fail to send are logged and dropped, never retried.
//!
//! The queue is bounded (8192 metrics by default). When the server is slow or unreachable and the queue fills up,
//! newly recorded metrics are dropped. Drops are counted in the client [telemetry][StatsdClient::telemetry].
//!
//! # Sampling
//!
//! Every metric takes a sample rate in `(0, 1]`. Metrics with a rate below 1 are only sent with that probability, and
//! carry the rate (`|@0.1`) so that the server can scale them back up. Rates above 1 are treated as 1, while rates of
//! zero or below are invalid and the metric is dropped.
//!
//! # Gauges
//!
//! StatsD reads a gauge value with a leading sign as a delta. Gauge deltas are always sent with an explicit sign, and
//! setting a gauge to a negative value sends a reset to zero followed by the negative delta, in a single payload.
//!
//! # Timing
//!
//! [`Timer`] measures how long a piece of code takes, either as a scope guard or by wrapping a function.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod action;
pub use self::action::{Action, MetricValue, SampleRate};

mod builder;
pub use self::builder::{BuildError, StatsdBuilder, DEFAULT_PORT};

mod client;
pub use self::client::StatsdClient;

mod dispatcher;
pub use self::dispatcher::DispatchError;

mod forwarder;
pub use self::forwarder::{MetricSink, UdpMetricSink};

mod global;
pub use self::global::{
    decr, decrement, distinct, global_client, incr, increment, set, timing, timing_since,
};

mod telemetry;
pub use self::telemetry::TelemetrySnapshot;

mod timer;
pub use self::timer::{Timer, TimerError, TimerGuard};

mod writer;
