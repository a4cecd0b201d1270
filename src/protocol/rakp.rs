//! RMCP+ session-setup payloads: Open Session and RAKP messages 1-4
//! (IPMI v2.0 section 13.17 - 13.23).

use super::{algorithm, read_u32_le};
use crate::error::{Error, Result};

const OPEN_SESSION_REQUEST_LEN: usize = 32;
const OPEN_SESSION_RESPONSE_LEN: usize = 36;
const STATUS_HEADER_LEN: usize = 8;
const RAKP2_FIXED_LEN: usize = 40;
const RAKP1_FIXED_LEN: usize = 28;

const PROPOSAL_AUTH: u8 = 0x00;
const PROPOSAL_INTEGRITY: u8 = 0x01;
const PROPOSAL_CONFIDENTIALITY: u8 = 0x02;

/// Role bit 4: look the user up by name only.
pub(crate) const ROLE_NAME_ONLY_LOOKUP: u8 = 0x10;

/// Open Session Request (Table 13-9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenSessionRequest {
    pub(crate) message_tag: u8,
    pub(crate) max_privilege: u8,
    pub(crate) console_session_id: u32,
    pub(crate) auth_algorithm: u8,
    pub(crate) integrity_algorithm: u8,
    pub(crate) confidentiality_algorithm: u8,
}

impl OpenSessionRequest {
    pub(crate) fn pack(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(OPEN_SESSION_REQUEST_LEN);
        p.push(self.message_tag);
        p.push(self.max_privilege & 0x0F);
        p.extend_from_slice(&[0x00, 0x00]);
        p.extend_from_slice(&self.console_session_id.to_le_bytes());
        p.extend_from_slice(&proposal(PROPOSAL_AUTH, self.auth_algorithm));
        p.extend_from_slice(&proposal(PROPOSAL_INTEGRITY, self.integrity_algorithm));
        p.extend_from_slice(&proposal(
            PROPOSAL_CONFIDENTIALITY,
            self.confidentiality_algorithm,
        ));
        p
    }

    #[cfg(test)]
    pub(crate) fn unpack(p: &[u8]) -> Result<Self> {
        if p.len() != OPEN_SESSION_REQUEST_LEN {
            return Err(Error::Decoding("Open Session request length mismatch"));
        }
        Ok(Self {
            message_tag: p[0],
            max_privilege: p[1] & 0x0F,
            console_session_id: read_u32_le(p, 4)?,
            auth_algorithm: p[12] & 0x3F,
            integrity_algorithm: p[20] & 0x3F,
            confidentiality_algorithm: p[28] & 0x3F,
        })
    }
}

fn proposal(kind: u8, algorithm: u8) -> [u8; 8] {
    [kind, 0x00, 0x00, 0x08, algorithm & 0x3F, 0x00, 0x00, 0x00]
}

/// Open Session Response (Table 13-10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenSessionResponse {
    pub(crate) message_tag: u8,
    pub(crate) status_code: u8,
    pub(crate) max_privilege: u8,
    pub(crate) console_session_id: u32,
    pub(crate) managed_session_id: u32,
    pub(crate) auth_algorithm: u8,
    pub(crate) integrity_algorithm: u8,
    pub(crate) confidentiality_algorithm: u8,
}

impl OpenSessionResponse {
    /// Parse a response; error responses may stop after the console session ID.
    pub(crate) fn unpack(p: &[u8]) -> Result<Self> {
        if p.len() < STATUS_HEADER_LEN {
            return Err(Error::Decoding("Open Session response too short"));
        }
        let mut out = Self {
            message_tag: p[0],
            status_code: p[1],
            max_privilege: p[2],
            console_session_id: read_u32_le(p, 4)?,
            managed_session_id: 0,
            auth_algorithm: 0,
            integrity_algorithm: 0,
            confidentiality_algorithm: 0,
        };
        if out.status_code != 0 {
            return Ok(out);
        }
        if p.len() != OPEN_SESSION_RESPONSE_LEN {
            return Err(Error::Decoding("Open Session response length mismatch"));
        }
        out.managed_session_id = read_u32_le(p, 8)?;
        out.auth_algorithm = p[16] & 0x3F;
        out.integrity_algorithm = p[24] & 0x3F;
        out.confidentiality_algorithm = p[32] & 0x3F;
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn pack(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(OPEN_SESSION_RESPONSE_LEN);
        p.push(self.message_tag);
        p.push(self.status_code);
        p.push(self.max_privilege);
        p.push(0x00);
        p.extend_from_slice(&self.console_session_id.to_le_bytes());
        p.extend_from_slice(&self.managed_session_id.to_le_bytes());
        p.extend_from_slice(&proposal(PROPOSAL_AUTH, self.auth_algorithm));
        p.extend_from_slice(&proposal(PROPOSAL_INTEGRITY, self.integrity_algorithm));
        p.extend_from_slice(&proposal(
            PROPOSAL_CONFIDENTIALITY,
            self.confidentiality_algorithm,
        ));
        p
    }
}

/// RAKP Message 1 (Table 13-11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rakp1 {
    pub(crate) message_tag: u8,
    pub(crate) managed_session_id: u32,
    pub(crate) console_random: [u8; 16],
    pub(crate) role: u8,
    pub(crate) username: Vec<u8>,
}

impl Rakp1 {
    pub(crate) fn pack(&self) -> Result<Vec<u8>> {
        let ulen = u8::try_from(self.username.len())
            .ok()
            .filter(|&n| n <= 16)
            .ok_or(Error::InvalidArgument("username exceeds 16 bytes"))?;
        let mut p = Vec::with_capacity(RAKP1_FIXED_LEN + self.username.len());
        p.push(self.message_tag);
        p.extend_from_slice(&[0x00, 0x00, 0x00]);
        p.extend_from_slice(&self.managed_session_id.to_le_bytes());
        p.extend_from_slice(&self.console_random);
        p.push(self.role);
        p.extend_from_slice(&[0x00, 0x00]);
        p.push(ulen);
        p.extend_from_slice(&self.username);
        Ok(p)
    }

    #[cfg(test)]
    pub(crate) fn unpack(p: &[u8]) -> Result<Self> {
        if p.len() < RAKP1_FIXED_LEN || p.len() != RAKP1_FIXED_LEN + p[27] as usize {
            return Err(Error::Decoding("RAKP message 1 length mismatch"));
        }
        let mut console_random = [0u8; 16];
        console_random.copy_from_slice(&p[8..24]);
        Ok(Self {
            message_tag: p[0],
            managed_session_id: read_u32_le(p, 4)?,
            console_random,
            role: p[24],
            username: p[RAKP1_FIXED_LEN..].to_vec(),
        })
    }
}

/// RAKP Message 2 (Table 13-12).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rakp2 {
    pub(crate) message_tag: u8,
    pub(crate) status_code: u8,
    pub(crate) console_session_id: u32,
    pub(crate) managed_random: [u8; 16],
    pub(crate) managed_guid: [u8; 16],
    pub(crate) key_exchange_auth_code: Vec<u8>,
}

impl Rakp2 {
    /// Parse a RAKP-2 whose auth code length follows `auth_algorithm`.
    pub(crate) fn unpack(p: &[u8], auth_algorithm: u8) -> Result<Self> {
        if p.len() < STATUS_HEADER_LEN {
            return Err(Error::Decoding("RAKP message 2 too short"));
        }
        let message_tag = p[0];
        let status_code = p[1];
        let console_session_id = read_u32_le(p, 4)?;
        if status_code != 0 {
            return Ok(Self {
                message_tag,
                status_code,
                console_session_id,
                managed_random: [0u8; 16],
                managed_guid: [0u8; 16],
                key_exchange_auth_code: Vec::new(),
            });
        }

        let code_len = algorithm::key_exchange_code_len(auth_algorithm)?;
        if p.len() != RAKP2_FIXED_LEN + code_len {
            return Err(Error::Decoding("RAKP message 2 length mismatch"));
        }
        let mut managed_random = [0u8; 16];
        managed_random.copy_from_slice(&p[8..24]);
        let mut managed_guid = [0u8; 16];
        managed_guid.copy_from_slice(&p[24..40]);
        Ok(Self {
            message_tag,
            status_code,
            console_session_id,
            managed_random,
            managed_guid,
            key_exchange_auth_code: p[RAKP2_FIXED_LEN..].to_vec(),
        })
    }

    #[cfg(test)]
    pub(crate) fn pack(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(RAKP2_FIXED_LEN + self.key_exchange_auth_code.len());
        p.push(self.message_tag);
        p.push(self.status_code);
        p.extend_from_slice(&[0x00, 0x00]);
        p.extend_from_slice(&self.console_session_id.to_le_bytes());
        p.extend_from_slice(&self.managed_random);
        p.extend_from_slice(&self.managed_guid);
        p.extend_from_slice(&self.key_exchange_auth_code);
        p
    }
}

/// RAKP Message 3 (Table 13-13).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rakp3 {
    pub(crate) message_tag: u8,
    pub(crate) status_code: u8,
    pub(crate) managed_session_id: u32,
    pub(crate) key_exchange_auth_code: Vec<u8>,
}

impl Rakp3 {
    pub(crate) fn pack(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(STATUS_HEADER_LEN + self.key_exchange_auth_code.len());
        p.push(self.message_tag);
        p.push(self.status_code);
        p.extend_from_slice(&[0x00, 0x00]);
        p.extend_from_slice(&self.managed_session_id.to_le_bytes());
        p.extend_from_slice(&self.key_exchange_auth_code);
        p
    }

    #[cfg(test)]
    pub(crate) fn unpack(p: &[u8]) -> Result<Self> {
        if p.len() < STATUS_HEADER_LEN {
            return Err(Error::Decoding("RAKP message 3 too short"));
        }
        Ok(Self {
            message_tag: p[0],
            status_code: p[1],
            managed_session_id: read_u32_le(p, 4)?,
            key_exchange_auth_code: p[STATUS_HEADER_LEN..].to_vec(),
        })
    }
}

/// RAKP Message 4 (Table 13-14).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rakp4 {
    pub(crate) message_tag: u8,
    pub(crate) status_code: u8,
    pub(crate) console_session_id: u32,
    pub(crate) integrity_check_value: Vec<u8>,
}

impl Rakp4 {
    pub(crate) fn unpack(p: &[u8], auth_algorithm: u8) -> Result<Self> {
        if p.len() < STATUS_HEADER_LEN {
            return Err(Error::Decoding("RAKP message 4 too short"));
        }
        let mut out = Self {
            message_tag: p[0],
            status_code: p[1],
            console_session_id: read_u32_le(p, 4)?,
            integrity_check_value: Vec::new(),
        };
        if out.status_code != 0 {
            return Ok(out);
        }
        let icv_len = algorithm::integrity_check_len(auth_algorithm)?;
        if p.len() != STATUS_HEADER_LEN + icv_len {
            return Err(Error::Decoding("RAKP message 4 length mismatch"));
        }
        out.integrity_check_value = p[STATUS_HEADER_LEN..].to_vec();
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn pack(&self) -> Vec<u8> {
        let mut p = Vec::with_capacity(STATUS_HEADER_LEN + self.integrity_check_value.len());
        p.push(self.message_tag);
        p.push(self.status_code);
        p.extend_from_slice(&[0x00, 0x00]);
        p.extend_from_slice(&self.console_session_id.to_le_bytes());
        p.extend_from_slice(&self.integrity_check_value);
        p
    }
}
