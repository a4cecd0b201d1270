#![deny(unsafe_code)]
#![warn(missing_docs)]

//! An IPMI-over-LAN client library.
//!
//! The crate implements:
//! - RMCP/ASF presence ping and pong
//! - IPMI v1.5 sessions (none, straight password and MD5 authentication)
//!   with a background keep-alive
//! - IPMI v2.0 RMCP+ sessions: Open Session, RAKP 1-4, HMAC-SHA1-96
//!   integrity and AES-CBC-128 confidentiality
//! - IPMB bridging through nested `Send Message` requests
//! - Serial-over-LAN console relay
//!
//! The blocking [`Client`] is the primary API; an async [`AsyncClient`] on
//! tokio is available behind the `async` feature. Protocol framing stays
//! internal; commands are issued through the [`commands::Command`] trait or
//! as raw bytes.
//!
//! ```no_run
//! use ipmi_lan::{ClientBuilder, Session};
//!
//! # fn main() -> ipmi_lan::Result<()> {
//! let client = ClientBuilder::new("192.0.2.10:623".parse().unwrap()).build()?;
//! let mut session = Session::new();
//! session.set_credentials("admin", "password")?;
//! client.establish_session(session)?;
//! println!("{:?}", client.get_device_id()?);
//! client.close_session()?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod commands;
mod crypto;
mod debug;
mod error;
mod handshake;
mod ipmb;
mod observe;
mod protocol;
mod session;
mod transport;
mod types;

#[cfg(feature = "blocking")]
pub use crate::client::Client;
#[cfg(feature = "async")]
pub use crate::client::AsyncClient;
pub use crate::client::ClientBuilder;
pub use crate::crypto::SessionKeys;
pub use crate::error::{Error, Result};
pub use crate::session::Session;
#[cfg(feature = "async")]
pub use crate::transport::AsyncTransport;
#[cfg(feature = "blocking")]
pub use crate::transport::Transport;
pub use crate::types::{
    ActivatedSession, AuthType, ChannelAuthCapabilities, DeviceId, PayloadActivation,
    PayloadType, PrivilegeLevel, RawResponse, Routing, SessionChallenge, Target,
};
