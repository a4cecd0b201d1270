use crate::error::{Error, Result};

const SOL_HEADER_LEN: usize = 4;

/// Serial-over-LAN payload (IPMI v2.0 Table 15-2 / 15-3).
///
/// Sequence numbers are 4-bit; zero means "no character data / ack only".
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SolPacket {
    pub(crate) sequence: u8,
    pub(crate) ack_sequence: u8,
    pub(crate) accepted_chars: u8,
    pub(crate) status: u8,
    pub(crate) data: Vec<u8>,
}

impl SolPacket {
    pub(crate) fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SOL_HEADER_LEN + self.data.len());
        out.push(self.sequence & 0x0F);
        out.push(self.ack_sequence & 0x0F);
        out.push(self.accepted_chars);
        out.push(self.status);
        out.extend_from_slice(&self.data);
        out
    }

    pub(crate) fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SOL_HEADER_LEN {
            return Err(Error::Decoding("SOL payload too short"));
        }
        Ok(Self {
            sequence: bytes[0] & 0x0F,
            ack_sequence: bytes[1] & 0x0F,
            accepted_chars: bytes[2],
            status: bytes[3],
            data: bytes[SOL_HEADER_LEN..].to_vec(),
        })
    }
}

/// Console side of the SOL character relay.
///
/// The first packet carries a carriage return to wake the console. Every
/// packet with character data is answered by an ack-only packet (sequence
/// 0); ack-only packets from the BMC are not answered.
#[derive(Debug)]
pub(crate) struct SolRelay {
    sequence: u8,
    ack_sequence: u8,
    accepted_chars: u8,
    outgoing: Option<Vec<u8>>,
}

impl SolRelay {
    pub(crate) fn new() -> Self {
        Self {
            sequence: 1,
            ack_sequence: 0,
            accepted_chars: 0,
            outgoing: Some(b"\r".to_vec()),
        }
    }

    /// The packet to send on this tick, if any. Resent until something arrives.
    pub(crate) fn outgoing(&self) -> Option<SolPacket> {
        self.outgoing.as_ref().map(|data| SolPacket {
            sequence: self.sequence,
            ack_sequence: self.ack_sequence,
            accepted_chars: self.accepted_chars,
            status: 0,
            data: data.clone(),
        })
    }

    /// Account for a packet from the BMC; returns its character data, if any.
    pub(crate) fn on_packet(&mut self, packet: SolPacket) -> Option<Vec<u8>> {
        self.ack_sequence = packet.sequence;
        self.accepted_chars = u8::try_from(packet.data.len()).unwrap_or(u8::MAX);
        if packet.data.is_empty() {
            self.outgoing = None;
            return None;
        }
        self.sequence = 0;
        self.outgoing = Some(Vec::new());
        Some(packet.data)
    }
}
