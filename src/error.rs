use std::io;

use thiserror::Error;

/// Result type used across this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket, OS, etc.).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Operation timed out.
    #[error("timeout waiting for response")]
    Timeout,

    /// A received frame is malformed, truncated, over-long or of an unknown sub-type.
    #[error("decoding error: {0}")]
    Decoding(&'static str),

    /// A received frame is malformed (with details).
    #[error("decoding error: {0}")]
    DecodingOwned(String),

    /// Peer responded with an unexpected packet, or the call is invalid in the current state.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// Peer responded with an unexpected packet.
    #[error("protocol error: {0}")]
    ProtocolOwned(String),

    /// The managed system's RAKP key-exchange authentication code did not verify.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// An integrity check value or packet auth code did not verify.
    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(&'static str),

    /// Cryptographic failure (invalid key sizes, decrypt failure, etc.).
    #[error("crypto error: {0}")]
    Crypto(&'static str),

    /// Unsupported authentication type, cipher suite or IPMI version.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// Invalid caller-supplied argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An IPMI command completed with a non-zero completion code.
    #[error("ipmi completion code: {completion_code:#04x}")]
    CompletionCode {
        /// Raw completion code returned by the BMC.
        completion_code: u8,
    },
}

impl Error {
    pub(crate) fn decoding_owned(msg: impl Into<String>) -> Self {
        Self::DecodingOwned(msg.into())
    }

    pub(crate) fn protocol_owned(msg: impl Into<String>) -> Self {
        Self::ProtocolOwned(msg.into())
    }

    /// Whether this error is a receive timeout.
    ///
    /// Timeouts are recoverable: the SOL relay and the keep-alive probe retry
    /// on them, single-shot requests hand them back to the caller.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Whether this error reports a malformed frame.
    pub fn is_decoding(&self) -> bool {
        matches!(self, Self::Decoding(_) | Self::DecodingOwned(_))
    }
}
