use std::net::SocketAddr;
use std::time::Duration;

use crate::ipmb::{BMC_SLAVE_ADDR, REMOTE_SWID};
use crate::protocol::rmcp::RMCP_SEQ_NO_ACK;
use crate::types::PrivilegeLevel;

#[cfg(feature = "blocking")]
pub(crate) mod blocking;

pub(crate) mod core;

#[cfg(all(test, feature = "blocking"))]
pub(crate) mod fake;

#[cfg(feature = "blocking")]
pub(crate) mod keepalive;

#[cfg(feature = "async")]
pub(crate) mod tokio;

/// Maximum UDP payload we accept.
///
/// IPMI packets are small; 4 KiB is a conservative upper bound.
const DEFAULT_MAX_PACKET_SIZE: usize = 4096;

/// Builder for [`Client`](crate::Client) and [`AsyncClient`](crate::AsyncClient).
///
/// Sessions are opened separately with `establish_session`; the builder only
/// sets up addressing and the socket.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    pub(crate) target: SocketAddr,
    pub(crate) timeout: Duration,
    pub(crate) requester_address: u8,
    pub(crate) bmc_address: u8,
    pub(crate) keep_alive_interval: Option<Duration>,
    pub(crate) initial_rmcp_sequence: u8,
    pub(crate) max_packet_size: usize,
    pub(crate) privilege_level: PrivilegeLevel,
}

impl ClientBuilder {
    /// Create a new builder for the BMC at `target` (usually port 623).
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            timeout: Duration::from_secs(2),
            requester_address: REMOTE_SWID,
            bmc_address: BMC_SLAVE_ADDR,
            keep_alive_interval: Some(Duration::from_secs(1)),
            initial_rmcp_sequence: RMCP_SEQ_NO_ACK,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            privilege_level: PrivilegeLevel::Administrator,
        }
    }

    /// Set the receive timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the requester (console) slave address. Defaults to the remote console software ID 0x81.
    pub fn requester_address(mut self, address: u8) -> Self {
        self.requester_address = address;
        self
    }

    /// Set the BMC's IPMB address. Defaults to 0x20.
    pub fn bmc_address(mut self, address: u8) -> Self {
        self.bmc_address = address;
        self
    }

    /// Set the IPMI v1.5 keep-alive interval; `None` disables keep-alive.
    pub fn keep_alive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set the first RMCP sequence number.
    ///
    /// The default 0xFF asks the BMC not to acknowledge and keeps the
    /// counter there; any other value cycles through 0-254.
    pub fn initial_rmcp_sequence(mut self, sequence: u8) -> Self {
        self.initial_rmcp_sequence = sequence;
        self
    }

    /// Set the receive buffer size.
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Set the privilege requested when a session is established.
    pub fn privilege_level(mut self, level: PrivilegeLevel) -> Self {
        self.privilege_level = level;
        self
    }

    pub(crate) fn core_config(&self) -> self::core::CoreConfig {
        self::core::CoreConfig {
            requester_address: self.requester_address,
            bmc_address: self.bmc_address,
            initial_rmcp_sequence: self.initial_rmcp_sequence,
        }
    }
}

#[cfg(feature = "blocking")]
pub use blocking::Client;

#[cfg(feature = "async")]
pub use self::tokio::AsyncClient;
