use std::{
    io,
    net::{SocketAddr, ToSocketAddrs as _},
};

mod udp;
pub use self::udp::UdpMetricSink;

/// Destination for encoded metric payloads.
///
/// The dispatcher hands every payload to its sink exactly once. Errors are logged by the dispatcher and the payload is
/// dropped; sinks should not retry.
pub trait MetricSink: Send + 'static {
    /// Sends a single payload.
    ///
    /// # Errors
    ///
    /// If the payload could not be sent, an error is returned.
    fn send(&mut self, payload: &[u8]) -> io::Result<usize>;
}

impl<F> MetricSink for F
where
    F: FnMut(&[u8]) -> io::Result<usize> + Send + 'static,
{
    fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        self(payload)
    }
}

/// Resolves a host/port pair to the address metrics will be sent to.
///
/// Resolution happens once, and the chosen address is used for the lifetime of the client. IPv4 addresses are
/// preferred, so that `localhost` reaches a server listening on `0.0.0.0` even when it also resolves to `::1`.
pub(crate) fn resolve_remote_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let addrs = (host, port).to_socket_addrs().map_err(|e| e.to_string())?;
    select_remote_addr(addrs).ok_or_else(|| format!("no addresses found for '{}'", host))
}

/// Picks the first IPv4 address, falling back to the first IPv6 address.
fn select_remote_addr<I>(addrs: I) -> Option<SocketAddr>
where
    I: IntoIterator<Item = SocketAddr>,
{
    let mut fallback = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        fallback = fallback.or(Some(addr));
    }
    fallback
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::{resolve_remote_addr, select_remote_addr};

    #[test]
    fn resolve() {
        let addr = resolve_remote_addr("127.0.0.1", 8125).unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 8125)));

        let addr = resolve_remote_addr("::1", 9125).unwrap();
        assert_eq!(addr, SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 1], 9125)));

        assert!(resolve_remote_addr("not a host name", 8125).is_err());
    }

    #[test]
    fn prefers_ipv4() {
        let v6 = SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 1], 8125));
        let v4 = SocketAddr::from(([127, 0, 0, 1], 8125));
        let other_v6 = SocketAddr::from(([0xfe80, 0, 0, 0, 0, 0, 0, 1], 8125));

        assert_eq!(select_remote_addr([v6, v4]), Some(v4));
        assert_eq!(select_remote_addr([v4, v6]), Some(v4));
        assert_eq!(select_remote_addr([v6, other_v6]), Some(v6));
        assert_eq!(select_remote_addr(Vec::<SocketAddr>::new()), None);
    }
}
