use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    time::Duration,
};

use super::MetricSink;

/// Sends payloads as UDP datagrams to a fixed address.
pub struct UdpMetricSink {
    addr: SocketAddr,
    socket: UdpSocket,
}

impl UdpMetricSink {
    /// Creates a new `UdpMetricSink` sending to `addr`.
    ///
    /// The local socket is bound to an ephemeral port of the same address family as `addr`. A zero `write_timeout`
    /// disables the timeout.
    ///
    /// # Errors
    ///
    /// If the local socket cannot be bound or configured, an error is returned.
    pub fn new(addr: SocketAddr, write_timeout: Duration) -> io::Result<Self> {
        let bind_addr = if addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_write_timeout(Some(write_timeout).filter(|t| !t.is_zero()))?;

        Ok(UdpMetricSink { addr, socket })
    }

    /// Returns the address payloads are sent to.
    pub fn remote_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl MetricSink for UdpMetricSink {
    fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send_to(payload, self.addr)
    }
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use super::UdpMetricSink;
    use crate::forwarder::MetricSink as _;

    #[test]
    fn sends_datagrams() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        let mut sink = UdpMetricSink::new(server.local_addr().unwrap(), Duration::from_secs(1)).unwrap();
        assert_eq!(sink.remote_addr(), server.local_addr().unwrap());
        assert_eq!(sink.send(b"foo.bar:1|c").unwrap(), 11);

        let mut buf = [0u8; 64];
        let (len, _) = server.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"foo.bar:1|c");
    }
}
