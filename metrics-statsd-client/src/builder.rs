use std::{env, io, time::Duration};

use rand::SeedableRng as _;
use rand_xoshiro::Xoshiro256StarStar;
use thiserror::Error;

use crate::{
    client::StatsdClient,
    dispatcher::Dispatcher,
    forwarder::{resolve_remote_addr, MetricSink, UdpMetricSink},
};

/// Default port of a StatsD server.
pub const DEFAULT_PORT: u16 = 8125;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_QUEUE_CAPACITY: usize = 8192;

const HOST_ENV_VAR: &str = "STATSD_HOST";
const PORT_ENV_VAR: &str = "STATSD_PORT";
const PREFIX_ENV_VAR: &str = "STATSD_PREFIX";

/// Errors that could occur while building or installing a StatsD client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to resolve the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the resolution failure.
        reason: String,
    },

    /// Failed to parse the remote port.
    #[error("invalid remote port '{value}'")]
    InvalidPort {
        /// The value that could not be parsed.
        value: String,
    },

    /// Failed to create the local socket.
    #[error("failed to create socket: {0}")]
    Io(#[from] io::Error),

    /// Failed to spawn the background thread.
    #[error("failed to spawn background thread for client")]
    Backend,

    /// Failed to install the client because a process-wide client already exists.
    #[error("a global client has already been installed")]
    AlreadyInstalled,
}

/// Builder for a StatsD client.
pub struct StatsdBuilder {
    host: String,
    port: u16,
    prefix: Option<String>,
    write_timeout: Duration,
    queue_capacity: Option<usize>,
    rng_seed: Option<u64>,
    sink: Option<Box<dyn MetricSink>>,
}

impl StatsdBuilder {
    /// Creates a builder from the `STATSD_HOST`, `STATSD_PORT` and `STATSD_PREFIX` environment variables.
    ///
    /// Variables that are not set keep their default value. An empty `STATSD_PREFIX` means no prefix.
    ///
    /// # Errors
    ///
    /// If `STATSD_PORT` is set but is not a valid port number, an error will be returned.
    pub fn from_env() -> Result<Self, BuildError> {
        let mut builder = StatsdBuilder::default();

        if let Ok(host) = env::var(HOST_ENV_VAR) {
            builder = builder.with_host(host);
        }

        if let Ok(port) = env::var(PORT_ENV_VAR) {
            let port = port.trim().parse().map_err(|_| BuildError::InvalidPort { value: port })?;
            builder = builder.with_port(port);
        }

        if let Ok(prefix) = env::var(PREFIX_ENV_VAR) {
            builder = builder.with_prefix(prefix);
        }

        Ok(builder)
    }

    /// Set the host of the StatsD server.
    ///
    /// The host is resolved once, when the client is built, and is never resolved again afterwards.
    ///
    /// Defaults to `localhost`.
    #[must_use]
    pub fn with_host<H>(mut self, host: H) -> Self
    where
        H: Into<String>,
    {
        self.host = host.into();
        self
    }

    /// Set the port of the StatsD server.
    ///
    /// Defaults to 8125.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the prefix applied to every metric name.
    ///
    /// Metric names are sent as `<prefix>.<name>`. An empty prefix disables prefixing.
    ///
    /// Defaults to no prefix.
    #[must_use]
    pub fn with_prefix<P>(mut self, prefix: P) -> Self
    where
        P: Into<String>,
    {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Set the write timeout for sending metrics.
    ///
    /// When the write timeout is reached, the payload being sent is dropped without retrying. A zero timeout disables
    /// the timeout entirely.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the capacity of the queue between the client and the background dispatcher.
    ///
    /// When the queue is full, new metrics are dropped rather than blocking the caller. A capacity of zero is treated
    /// as one. Passing `None` makes the queue unbounded, in which case memory usage grows without limit if the
    /// dispatcher falls behind.
    ///
    /// Defaults to 8192 metrics.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity.map(|capacity| capacity.max(1));
        self
    }

    /// Set the seed of the random number generator used for sampling.
    ///
    /// Fixing the seed makes sampling decisions reproducible.
    ///
    /// Defaults to a seed drawn from the thread-local generator.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Send metrics to a custom sink instead of a UDP socket.
    ///
    /// The host and port are ignored when a custom sink is set.
    #[must_use]
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: MetricSink,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Builds the client.
    ///
    /// The remote address is resolved, the socket is created, and the background dispatcher is started.
    ///
    /// # Errors
    ///
    /// If the remote address cannot be resolved, if the socket cannot be created, or if the background thread cannot
    /// be spawned, an error will be returned.
    pub fn build(self) -> Result<StatsdClient, BuildError> {
        let sink = match self.sink {
            Some(sink) => sink,
            None => {
                let addr = resolve_remote_addr(&self.host, self.port)
                    .map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
                Box::new(UdpMetricSink::new(addr, self.write_timeout)?)
            }
        };

        let rng = match self.rng_seed {
            Some(seed) => Xoshiro256StarStar::seed_from_u64(seed),
            None => Xoshiro256StarStar::from_rng(&mut rand::rng()),
        };

        let dispatcher = Dispatcher::new(sink, self.prefix, self.queue_capacity, rng);
        dispatcher.run().map_err(|_| BuildError::Backend)?;

        Ok(StatsdClient::new(dispatcher))
    }

    /// Builds the client and installs it as the process-wide client.
    ///
    /// # Errors
    ///
    /// If the client cannot be built, or if a process-wide client already exists, an error will be returned.
    pub fn install(self) -> Result<(), BuildError> {
        let client = self.build()?;
        crate::global::set_global_client(client)
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            prefix: None,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            queue_capacity: Some(DEFAULT_QUEUE_CAPACITY),
            rng_seed: None,
            sink: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use super::{BuildError, StatsdBuilder, DEFAULT_PORT};

    #[test]
    fn defaults() {
        let builder = StatsdBuilder::default();
        assert_eq!(builder.host, "localhost");
        assert_eq!(builder.port, DEFAULT_PORT);
        assert_eq!(builder.prefix, None);
        assert_eq!(builder.queue_capacity, Some(8192));

        let builder = builder.with_prefix("");
        assert_eq!(builder.prefix, None);

        let builder = builder.with_prefix("app");
        assert_eq!(builder.prefix.as_deref(), Some("app"));

        let builder = builder.with_queue_capacity(Some(0));
        assert_eq!(builder.queue_capacity, Some(1));

        let builder = builder.with_queue_capacity(None);
        assert_eq!(builder.queue_capacity, None);
    }

    #[test]
    fn unresolvable_host_fails_to_build() {
        let result = StatsdBuilder::default().with_host("not a host name").build();
        assert!(matches!(result, Err(BuildError::InvalidRemoteAddress { .. })));
    }

    #[test]
    fn builds_against_udp_server() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let port = server.local_addr().unwrap().port();

        let client = StatsdBuilder::default()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_prefix("app")
            .build()
            .unwrap();

        assert!(client.incr("foo.bar"));
        client.stop().unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = server.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"app.foo.bar:1|c");
    }
}
