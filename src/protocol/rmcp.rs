use crate::error::{Error, Result};

/// RMCP version 1.0 as carried in the header.
pub(crate) const RMCP_VERSION: u8 = 0x06;
/// Sequence value that tells the receiver not to send an RMCP ACK.
pub(crate) const RMCP_SEQ_NO_ACK: u8 = 0xFF;
pub(crate) const RMCP_HEADER_LEN: usize = 4;

const CLASS_MASK: u8 = 0x1F;
const CLASS_ACK: u8 = 0x80;

/// RMCP message class (header byte 3, low five bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageClass {
    Asf,
    Ipmi,
    Oem,
}

impl MessageClass {
    fn as_u8(self) -> u8 {
        match self {
            Self::Asf => 0x06,
            Self::Ipmi => 0x07,
            Self::Oem => 0x08,
        }
    }

    fn from_u8(value: u8) -> Result<Self> {
        match value & CLASS_MASK {
            0x06 => Ok(Self::Asf),
            0x07 => Ok(Self::Ipmi),
            0x08 => Ok(Self::Oem),
            _ => Err(Error::Decoding("unknown RMCP message class")),
        }
    }
}

/// RMCP envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RmcpMessage {
    pub(crate) sequence: u8,
    pub(crate) class: MessageClass,
    /// Set on RMCP ACK messages.
    pub(crate) ack: bool,
    pub(crate) payload: Vec<u8>,
}

impl RmcpMessage {
    pub(crate) fn new(sequence: u8, class: MessageClass, payload: Vec<u8>) -> Self {
        Self {
            sequence,
            class,
            ack: false,
            payload,
        }
    }

    pub(crate) fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RMCP_HEADER_LEN + self.payload.len());
        out.push(RMCP_VERSION);
        out.push(0x00);
        out.push(self.sequence);
        let ack = if self.ack { CLASS_ACK } else { 0 };
        out.push(self.class.as_u8() | ack);
        out.extend_from_slice(&self.payload);
        out
    }

    pub(crate) fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RMCP_HEADER_LEN {
            return Err(Error::Decoding("RMCP header too short"));
        }
        if bytes[0] != RMCP_VERSION {
            return Err(Error::Decoding("unsupported RMCP version"));
        }
        Ok(Self {
            sequence: bytes[2],
            class: MessageClass::from_u8(bytes[3])?,
            ack: bytes[3] & CLASS_ACK != 0,
            payload: bytes[RMCP_HEADER_LEN..].to_vec(),
        })
    }
}

/// Outgoing RMCP sequence counter.
///
/// Starting at [`RMCP_SEQ_NO_ACK`] pins the counter there; any other start
/// value cycles through `0..=254`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RmcpSequence(u8);

impl RmcpSequence {
    pub(crate) fn new(initial: u8) -> Self {
        Self(initial)
    }

    /// Return the current value and step the counter.
    pub(crate) fn advance(&mut self) -> u8 {
        let current = self.0;
        if current != RMCP_SEQ_NO_ACK {
            self.0 = ((current as u16 + 1) % 255) as u8;
        }
        current
    }
}
