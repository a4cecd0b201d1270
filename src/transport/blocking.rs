use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Blocking UDP transport connected to one BMC.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    max_packet_size: usize,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `target`.
    pub fn connect(target: SocketAddr, timeout: Duration, max_packet_size: usize) -> Result<Self> {
        let bind_addr = match target {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };

        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(target)?;
        socket.set_read_timeout(Some(non_zero(timeout)))?;

        Ok(Self {
            socket,
            max_packet_size,
        })
    }
}

impl Transport for UdpTransport {
    fn send(&self, datagram: &[u8]) -> Result<()> {
        crate::debug::dump_hex("udp tx", datagram);
        self.socket.send(datagram)?;
        Ok(())
    }

    fn recv(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.max_packet_size];
        match self.socket.recv(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                crate::debug::dump_hex("udp rx", &buf);
                Ok(buf)
            }
            Err(e) if is_timeout(&e) => Err(Error::Timeout),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.socket.set_read_timeout(Some(non_zero(timeout)))?;
        Ok(())
    }
}

// `set_read_timeout` rejects a zero duration.
fn non_zero(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
