//! Wire formats: RMCP envelope, ASF presence messages, IPMI v1.5 and v2.0
//! session frames, RMCP+ session-setup payloads and SOL payloads.

pub(crate) mod asf;
pub(crate) mod lan;
pub(crate) mod lanplus;
pub(crate) mod rakp;
pub(crate) mod rmcp;
pub(crate) mod sol;

/// Payload type numbers (see IPMI v2.0 Table 13-16).
///
/// We only implement the baseline types required for IPMI messaging, SOL and session setup.
pub(crate) mod payload_type {
    /// Standard IPMI payload (lan message) wrapped in RMCP+.
    pub const IPMI: u8 = 0x00;
    /// Serial-over-LAN character data.
    pub const SOL: u8 = 0x01;
    /// RMCP+ Open Session Request.
    pub const OPEN_SESSION_REQUEST: u8 = 0x10;
    /// RMCP+ Open Session Response.
    pub const OPEN_SESSION_RESPONSE: u8 = 0x11;
    /// RAKP Message 1.
    pub const RAKP_1: u8 = 0x12;
    /// RAKP Message 2.
    pub const RAKP_2: u8 = 0x13;
    /// RAKP Message 3.
    pub const RAKP_3: u8 = 0x14;
    /// RAKP Message 4.
    pub const RAKP_4: u8 = 0x15;

    pub(crate) fn is_known(payload_type: u8) -> bool {
        matches!(payload_type, IPMI | SOL | OPEN_SESSION_REQUEST..=RAKP_4)
    }
}

/// Algorithm numbers used in Open Session and RAKP.
///
/// This crate proposes and computes only:
/// - Authentication: RAKP-HMAC-SHA1
/// - Integrity: HMAC-SHA1-96
/// - Confidentiality: AES-CBC-128
pub(crate) mod algorithm {
    use crate::error::{Error, Result};

    /// Authentication algorithm: RAKP-none.
    pub const AUTH_RAKP_NONE: u8 = 0x00;
    /// Authentication algorithm: RAKP-HMAC-SHA1.
    pub const AUTH_RAKP_HMAC_SHA1: u8 = 0x01;
    /// Authentication algorithm: RAKP-HMAC-MD5.
    pub const AUTH_RAKP_HMAC_MD5: u8 = 0x02;
    /// Authentication algorithm: RAKP-HMAC-SHA256.
    pub const AUTH_RAKP_HMAC_SHA256: u8 = 0x03;
    /// Integrity algorithm: none.
    pub const INTEGRITY_NONE: u8 = 0x00;
    /// Integrity algorithm: HMAC-SHA1-96.
    pub const INTEGRITY_HMAC_SHA1_96: u8 = 0x01;
    /// Confidentiality algorithm: none.
    pub const CONFIDENTIALITY_NONE: u8 = 0x00;
    /// Confidentiality algorithm: AES-CBC-128.
    pub const CONFIDENTIALITY_AES_CBC_128: u8 = 0x01;

    /// Length of the key-exchange auth code carried by RAKP messages 2 and 3.
    pub(crate) fn key_exchange_code_len(auth_algorithm: u8) -> Result<usize> {
        match auth_algorithm {
            AUTH_RAKP_NONE => Ok(0),
            AUTH_RAKP_HMAC_SHA1 => Ok(20),
            AUTH_RAKP_HMAC_MD5 => Ok(16),
            AUTH_RAKP_HMAC_SHA256 => Ok(32),
            _ => Err(Error::NotSupported("unknown RAKP authentication algorithm")),
        }
    }

    /// Length of the integrity check value carried by RAKP message 4.
    pub(crate) fn integrity_check_len(auth_algorithm: u8) -> Result<usize> {
        match auth_algorithm {
            AUTH_RAKP_NONE => Ok(0),
            AUTH_RAKP_HMAC_SHA1 => Ok(12),
            AUTH_RAKP_HMAC_MD5 | AUTH_RAKP_HMAC_SHA256 => Ok(16),
            _ => Err(Error::NotSupported("unknown RAKP authentication algorithm")),
        }
    }
}

pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> crate::error::Result<u32> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(crate::error::Error::Decoding("truncated 32-bit field"))
}
