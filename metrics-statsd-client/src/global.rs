//! Process-wide client.
//!
//! The process-wide client is either installed explicitly, with [`StatsdBuilder::install`], or built on first use from
//! [`StatsdBuilder::from_env`]. Either way, it is created at most once and then shared by every caller.
//!
//! The free functions in this module forward to the process-wide client. If the client could not be built, the error
//! is kept, and metrics recorded through these functions are dropped.
use std::{fmt, time::Instant};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::{
    action::MetricValue,
    builder::{BuildError, StatsdBuilder},
    client::StatsdClient,
};

static GLOBAL_CLIENT: OnceCell<Result<StatsdClient, BuildError>> = OnceCell::new();

pub(crate) fn set_global_client(client: StatsdClient) -> Result<(), BuildError> {
    GLOBAL_CLIENT.set(Ok(client)).map_err(|_| BuildError::AlreadyInstalled)
}

/// Returns the process-wide client, building it from the environment if none was installed.
///
/// Every call returns the same client.
///
/// # Errors
///
/// If the process-wide client had to be built and that failed, the build error is returned. The build is not
/// attempted again.
pub fn global_client() -> Result<&'static StatsdClient, &'static BuildError> {
    GLOBAL_CLIENT
        .get_or_init(|| StatsdBuilder::from_env().and_then(StatsdBuilder::build))
        .as_ref()
}

fn with_global_client<F>(f: F) -> bool
where
    F: FnOnce(&StatsdClient) -> bool,
{
    match global_client() {
        Ok(client) => f(client),
        Err(e) => {
            debug!(error = %e, "Dropping metric, global client is unavailable.");
            false
        }
    }
}

/// Adjusts a counter by `delta`, or a gauge when `gauge` is `true`.
pub fn increment<S, V>(stat: S, delta: V, rate: f64, gauge: bool) -> bool
where
    S: Into<String>,
    V: Into<MetricValue>,
{
    with_global_client(|client| client.increment(stat, delta, rate, gauge))
}

/// Adjusts a counter by `-delta`, or a gauge when `gauge` is `true`.
pub fn decrement<S, V>(stat: S, delta: V, rate: f64, gauge: bool) -> bool
where
    S: Into<String>,
    V: Into<MetricValue>,
{
    with_global_client(|client| client.decrement(stat, delta, rate, gauge))
}

/// Increments a counter by one.
pub fn incr<S: Into<String>>(stat: S) -> bool {
    with_global_client(|client| client.incr(stat))
}

/// Decrements a counter by one.
pub fn decr<S: Into<String>>(stat: S) -> bool {
    with_global_client(|client| client.decr(stat))
}

/// Sets a gauge to `value`.
pub fn set<S, V>(stat: S, value: V, rate: f64) -> bool
where
    S: Into<String>,
    V: Into<MetricValue>,
{
    with_global_client(|client| client.set(stat, value, rate))
}

/// Records `value` as a member of a set.
pub fn distinct<S, M>(stat: S, value: M) -> bool
where
    S: Into<String>,
    M: fmt::Display,
{
    with_global_client(|client| client.distinct(stat, value))
}

/// Records a duration, in milliseconds.
pub fn timing<S: Into<String>>(stat: S, millis: f64, rate: f64) -> bool {
    with_global_client(|client| client.timing(stat, millis, rate))
}

/// Records the time elapsed since `start`, in milliseconds.
pub fn timing_since<S: Into<String>>(stat: S, start: Instant, rate: f64) -> bool {
    with_global_client(|client| client.timing_since(stat, start, rate))
}
