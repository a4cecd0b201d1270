use rand::RngCore;

use crate::crypto::{
    AES_BLOCK, SessionKeys, ct_eq, decrypt_payload, encrypt_payload, hmac_sha1_truncated_12,
};
use crate::error::{Error, Result};
use crate::types::AuthType;

const HEADER_LEN: usize = 12;
const NEXT_HEADER: u8 = 0x07;
const ENCRYPTED_BIT: u8 = 0x80;
const AUTHENTICATED_BIT: u8 = 0x40;
const PAYLOAD_TYPE_MASK: u8 = 0x3F;

/// IPMI v2.0 (RMCP+) session frame with a plaintext payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LanPlusFrame {
    pub(crate) payload_type: u8,
    pub(crate) session_id: u32,
    pub(crate) sequence: u32,
    pub(crate) encrypted: bool,
    pub(crate) authenticated: bool,
    pub(crate) payload: Vec<u8>,
}

impl LanPlusFrame {
    /// An unprotected pre-session frame (Open Session / RAKP).
    pub(crate) fn clear(payload_type: u8, payload: Vec<u8>) -> Self {
        Self {
            payload_type,
            session_id: 0,
            sequence: 0,
            encrypted: false,
            authenticated: false,
            payload,
        }
    }

    /// A frame protected with the session's confidentiality and integrity algorithms.
    pub(crate) fn protected(
        payload_type: u8,
        session_id: u32,
        sequence: u32,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            payload_type,
            session_id,
            sequence,
            encrypted: true,
            authenticated: true,
            payload,
        }
    }

    /// Serialize with a fresh random IV.
    pub(crate) fn pack(&self, keys: Option<&SessionKeys>) -> Result<Vec<u8>> {
        let mut iv = [0u8; AES_BLOCK];
        rand::rng().fill_bytes(&mut iv);
        self.pack_with_iv(keys, &iv)
    }

    pub(crate) fn pack_with_iv(
        &self,
        keys: Option<&SessionKeys>,
        iv: &[u8; AES_BLOCK],
    ) -> Result<Vec<u8>> {
        if (self.encrypted || self.authenticated) && keys.is_none() {
            return Err(Error::Protocol(
                "session keys required for a protected RMCP+ frame",
            ));
        }

        let body = match keys {
            Some(keys) if self.encrypted => encrypt_payload(&self.payload, &keys.aes_key(), iv)?,
            _ => self.payload.clone(),
        };
        let length: u16 = body
            .len()
            .try_into()
            .map_err(|_| Error::InvalidArgument("RMCP+ payload too large"))?;

        let mut type_byte = self.payload_type & PAYLOAD_TYPE_MASK;
        if self.encrypted {
            type_byte |= ENCRYPTED_BIT;
        }
        if self.authenticated {
            type_byte |= AUTHENTICATED_BIT;
        }

        let mut out = Vec::with_capacity(HEADER_LEN + body.len() + 20);
        out.push(AuthType::RmcpPlus.as_u8());
        out.push(type_byte);
        out.extend_from_slice(&self.session_id.to_le_bytes());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(&body);

        if let Some(keys) = keys.filter(|_| self.authenticated) {
            let pad_len = integrity_pad_len(body.len());
            out.extend(std::iter::repeat_n(0xFF, pad_len));
            out.push(pad_len as u8);
            out.push(NEXT_HEADER);
            let auth_code = hmac_sha1_truncated_12(keys.k1(), &out)?;
            out.extend_from_slice(&auth_code);
        }

        Ok(out)
    }

    pub(crate) fn unpack(bytes: &[u8], keys: Option<&SessionKeys>) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Decoding("RMCP+ session header too short"));
        }
        if bytes[0] != AuthType::RmcpPlus.as_u8() {
            return Err(Error::Decoding("not an RMCP+ session header"));
        }
        let type_byte = bytes[1];
        let payload_type = type_byte & PAYLOAD_TYPE_MASK;
        if !super::payload_type::is_known(payload_type) {
            return Err(Error::decoding_owned(format!(
                "unsupported RMCP+ payload type {payload_type:#04x}"
            )));
        }
        let encrypted = type_byte & ENCRYPTED_BIT != 0;
        let authenticated = type_byte & AUTHENTICATED_BIT != 0;
        let session_id = super::read_u32_le(bytes, 2)?;
        let sequence = super::read_u32_le(bytes, 6)?;
        let length = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;

        let payload_end = HEADER_LEN + length;
        if bytes.len() < payload_end {
            return Err(Error::Decoding("RMCP+ payload truncated"));
        }
        let body = &bytes[HEADER_LEN..payload_end];

        if authenticated {
            let keys = keys.ok_or(Error::Protocol("authenticated frame outside a session"))?;
            verify_trailer(bytes, payload_end, keys)?;
        } else if bytes.len() != payload_end {
            return Err(Error::Decoding("RMCP+ payload length mismatch"));
        }

        let payload = if encrypted {
            let keys = keys.ok_or(Error::Protocol("encrypted frame outside a session"))?;
            decrypt_payload(body, &keys.aes_key())?
        } else {
            body.to_vec()
        };

        Ok(Self {
            payload_type,
            session_id,
            sequence,
            encrypted,
            authenticated,
            payload,
        })
    }
}

/// Integrity pad that aligns header, payload, pad length and next header to 4 bytes.
fn integrity_pad_len(body_len: usize) -> usize {
    (4 - ((HEADER_LEN + body_len + 2) % 4)) % 4
}

fn verify_trailer(bytes: &[u8], payload_end: usize, keys: &SessionKeys) -> Result<()> {
    let auth_code_len = keys.auth_code_len();
    let expected_len = payload_end + integrity_pad_len(payload_end - HEADER_LEN) + 2 + auth_code_len;
    if bytes.len() != expected_len {
        return Err(Error::Decoding("RMCP+ session trailer length mismatch"));
    }

    let auth_code_start = bytes.len() - auth_code_len;
    let pad_len = bytes[auth_code_start - 2] as usize;
    let next_header = bytes[auth_code_start - 1];
    if next_header != NEXT_HEADER {
        return Err(Error::Decoding("unexpected RMCP+ next header"));
    }
    let pad = &bytes[payload_end..auth_code_start - 2];
    if pad.len() != pad_len || pad.iter().any(|&b| b != 0xFF) {
        return Err(Error::Decoding("invalid RMCP+ integrity pad"));
    }

    let expected = hmac_sha1_truncated_12(keys.k1(), &bytes[..auth_code_start])?;
    if !ct_eq(&expected, &bytes[auth_code_start..]) {
        return Err(Error::IntegrityCheckFailed("RMCP+ packet auth code mismatch"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::payload_type;

    fn keys() -> SessionKeys {
        SessionKeys::derive(&[0x33u8; 20]).expect("keys")
    }

    #[test]
    fn clear_frame_layout() {
        let frame = LanPlusFrame::clear(payload_type::OPEN_SESSION_REQUEST, vec![1, 2, 3, 4]);
        let bytes = frame.pack(None).expect("pack");
        assert_eq!(
            bytes,
            vec![0x06, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 1, 2, 3, 4]
        );
        assert_eq!(LanPlusFrame::unpack(&bytes, None).expect("unpack"), frame);
    }

    #[test]
    fn protected_frame_round_trip() {
        let keys = keys();
        let frame = LanPlusFrame::protected(payload_type::IPMI, 0xA0B0C0D0, 9, vec![0x20, 0x18, 0xC8]);
        let iv = [0x42u8; 16];
        let bytes = frame.pack_with_iv(Some(&keys), &iv).expect("pack");

        assert_eq!(bytes[1], 0xC0);
        assert_eq!(&bytes[2..6], &0xA0B0C0D0u32.to_le_bytes());
        assert_eq!(&bytes[6..10], &9u32.to_le_bytes());
        // iv + one AES block
        assert_eq!(u16::from_le_bytes([bytes[10], bytes[11]]), 32);
        assert_eq!(&bytes[12..28], &iv);
        // trailer: pad to 4, pad length, next header, 12-byte auth code
        assert_eq!((bytes.len() - 12) % 4, 0);
        assert_eq!(bytes[bytes.len() - 13], NEXT_HEADER);

        let parsed = LanPlusFrame::unpack(&bytes, Some(&keys)).expect("unpack");
        assert_eq!(parsed, frame);
    }

    #[test]
    fn tampered_frame_fails_integrity() {
        let keys = keys();
        let frame = LanPlusFrame::protected(payload_type::SOL, 1, 1, vec![0x55; 7]);
        let mut bytes = frame.pack(Some(&keys)).expect("pack");
        bytes[20] ^= 0x01;
        assert!(matches!(
            LanPlusFrame::unpack(&bytes, Some(&keys)),
            Err(Error::IntegrityCheckFailed(_))
        ));
    }

    #[test]
    fn protected_frame_needs_keys() {
        let frame = LanPlusFrame::protected(payload_type::IPMI, 1, 1, vec![0]);
        assert!(frame.pack(None).is_err());
    }

    #[test]
    fn lengths_must_match_exactly() {
        let bytes = LanPlusFrame::clear(payload_type::RAKP_1, vec![7; 5])
            .pack(None)
            .expect("pack");
        let mut long = bytes.clone();
        long.push(0);
        assert!(LanPlusFrame::unpack(&long, None).unwrap_err().is_decoding());
        assert!(
            LanPlusFrame::unpack(&bytes[..bytes.len() - 1], None)
                .unwrap_err()
                .is_decoding()
        );

        let keys = keys();
        let protected = LanPlusFrame::protected(payload_type::IPMI, 1, 1, vec![1; 3])
            .pack(Some(&keys))
            .expect("pack");
        let mut long = protected.clone();
        long.push(0);
        assert!(LanPlusFrame::unpack(&long, Some(&keys)).unwrap_err().is_decoding());
    }

    #[test]
    fn unknown_payload_type_is_rejected() {
        let mut bytes = LanPlusFrame::clear(payload_type::IPMI, vec![])
            .pack(None)
            .expect("pack");
        bytes[1] = 0x02;
        assert!(LanPlusFrame::unpack(&bytes, None).unwrap_err().is_decoding());
    }
}
