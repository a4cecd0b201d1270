#[cfg(feature = "blocking")]
use std::time::Duration;

#[cfg(feature = "blocking")]
use crate::error::Result;

/// A synchronous datagram transport for RMCP traffic.
///
/// `recv` must return [`crate::Error::Timeout`] when nothing arrives within
/// the configured timeout.
#[cfg(feature = "blocking")]
pub trait Transport {
    /// Send one datagram.
    fn send(&self, datagram: &[u8]) -> Result<()>;

    /// Wait for the next datagram.
    fn recv(&self) -> Result<Vec<u8>>;

    /// Change the receive timeout.
    fn set_timeout(&self, timeout: Duration) -> Result<()>;
}

#[cfg(feature = "async")]
mod async_support {
    use core::future::Future;
    use core::pin::Pin;

    use crate::error::Result;

    /// An asynchronous datagram transport for RMCP traffic.
    pub trait AsyncTransport {
        /// Send one datagram.
        fn send<'a>(
            &'a self,
            datagram: &'a [u8],
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

        /// Wait for the next datagram, failing with [`crate::Error::Timeout`].
        fn recv(&self) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + '_>>;
    }
}

#[cfg(feature = "async")]
pub use async_support::AsyncTransport;

#[cfg(feature = "blocking")]
pub(crate) mod blocking;

#[cfg(feature = "async")]
pub(crate) mod tokio;
