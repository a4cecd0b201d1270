use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::error::{Error, Result};
use crate::transport::AsyncTransport;

/// Tokio UDP transport connected to one BMC.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    max_packet_size: usize,
    timeout: Duration,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `target`.
    pub async fn connect(
        target: SocketAddr,
        timeout: Duration,
        max_packet_size: usize,
    ) -> Result<Self> {
        let bind_addr = match target {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;

        Ok(Self {
            socket,
            max_packet_size,
            timeout,
        })
    }

    async fn recv_impl(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.max_packet_size];
        match tokio::time::timeout(self.timeout, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                buf.truncate(n);
                crate::debug::dump_hex("udp rx", &buf);
                Ok(buf)
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_elapsed) => Err(Error::Timeout),
        }
    }
}

impl AsyncTransport for UdpTransport {
    fn send<'a>(
        &'a self,
        datagram: &'a [u8],
    ) -> core::pin::Pin<Box<dyn core::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            crate::debug::dump_hex("udp tx", datagram);
            self.socket.send(datagram).await?;
            Ok(())
        })
    }

    fn recv(
        &self,
    ) -> core::pin::Pin<Box<dyn core::future::Future<Output = Result<Vec<u8>>> + Send + '_>> {
        Box::pin(self.recv_impl())
    }
}
