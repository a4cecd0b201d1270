use crate::error::{Error, Result};

/// IANA enterprise number of the ASF / IPMI forum.
pub(crate) const ASF_IANA: u32 = 4542;

const TYPE_PRESENCE_PONG: u8 = 0x40;
const TYPE_PRESENCE_PING: u8 = 0x80;
const ASF_HEADER_LEN: usize = 8;
const PONG_BODY_LEN: usize = 16;

/// Body of an ASF Presence Pong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AsfPong {
    pub(crate) oem_iana: u32,
    pub(crate) oem_defined: u32,
    pub(crate) supported_entities: u8,
    pub(crate) supported_interactions: u8,
}

impl AsfPong {
    /// Whether the responder advertises IPMI support (entities bit 7).
    pub(crate) fn supports_ipmi(&self) -> bool {
        self.supported_entities & 0x80 != 0
    }

    fn validate(&self) -> Result<()> {
        if self.oem_iana == ASF_IANA && self.oem_defined != 0 {
            return Err(Error::Decoding("ASF pong OEM-defined data must be zero"));
        }
        if self.supported_interactions != 0 {
            return Err(Error::Decoding("ASF pong supported interactions must be zero"));
        }
        Ok(())
    }
}

/// ASF message carried in an RMCP envelope of class ASF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AsfMessage {
    Ping { tag: u8 },
    Pong { tag: u8, body: AsfPong },
}

impl AsfMessage {
    #[cfg(test)]
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Self::Ping { tag } | Self::Pong { tag, .. } => *tag,
        }
    }

    pub(crate) fn pack(&self) -> Vec<u8> {
        let (kind, tag, body) = match self {
            Self::Ping { tag } => (TYPE_PRESENCE_PING, *tag, Vec::new()),
            Self::Pong { tag, body } => {
                let mut data = Vec::with_capacity(PONG_BODY_LEN);
                data.extend_from_slice(&body.oem_iana.to_be_bytes());
                data.extend_from_slice(&body.oem_defined.to_be_bytes());
                data.push(body.supported_entities);
                data.push(body.supported_interactions);
                data.extend_from_slice(&[0u8; 6]);
                (TYPE_PRESENCE_PONG, *tag, data)
            }
        };

        let mut out = Vec::with_capacity(ASF_HEADER_LEN + body.len());
        out.extend_from_slice(&ASF_IANA.to_be_bytes());
        out.push(kind);
        out.push(tag);
        out.push(0x00);
        out.push(body.len() as u8);
        out.extend_from_slice(&body);
        out
    }

    pub(crate) fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ASF_HEADER_LEN {
            return Err(Error::Decoding("ASF header too short"));
        }
        let kind = bytes[4];
        let tag = bytes[5];
        let declared = bytes[7] as usize;
        let data = &bytes[ASF_HEADER_LEN..];
        if data.len() != declared {
            return Err(Error::Decoding("ASF data length mismatch"));
        }

        match kind {
            TYPE_PRESENCE_PING if declared == 0 => Ok(Self::Ping { tag }),
            TYPE_PRESENCE_PONG if declared == PONG_BODY_LEN => {
                let body = AsfPong {
                    oem_iana: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
                    oem_defined: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
                    supported_entities: data[8],
                    supported_interactions: data[9],
                };
                body.validate()?;
                Ok(Self::Pong { tag, body })
            }
            TYPE_PRESENCE_PING | TYPE_PRESENCE_PONG => {
                Err(Error::Decoding("ASF body length invalid for message type"))
            }
            _ => Err(Error::decoding_owned(format!(
                "unsupported ASF message type {kind:#04x}"
            ))),
        }
    }
}
