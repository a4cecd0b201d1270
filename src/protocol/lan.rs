use crate::crypto::md5_auth_code;
use crate::error::{Error, Result};
use crate::types::AuthType;

const HEADER_LEN_NO_AUTH: usize = 10;
const AUTH_CODE_LEN: usize = 16;

/// IPMI v1.5 session frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LanFrame {
    pub(crate) auth_type: AuthType,
    pub(crate) sequence: u32,
    pub(crate) session_id: u32,
    pub(crate) auth_code: Option<[u8; 16]>,
    pub(crate) payload: Vec<u8>,
}

impl LanFrame {
    /// Build a frame and compute its auth code for `auth_type`.
    pub(crate) fn seal(
        auth_type: AuthType,
        session_id: u32,
        sequence: u32,
        password: &[u8; 16],
        payload: Vec<u8>,
    ) -> Result<Self> {
        let auth_code = auth_code_for(auth_type, session_id, sequence, password, &payload)?;
        Ok(Self {
            auth_type,
            sequence,
            session_id,
            auth_code,
            payload,
        })
    }

    pub(crate) fn pack(&self) -> Result<Vec<u8>> {
        let length = u8::try_from(self.payload.len())
            .map_err(|_| Error::InvalidArgument("IPMI v1.5 payload exceeds 255 bytes"))?;

        let mut out = Vec::with_capacity(HEADER_LEN_NO_AUTH + AUTH_CODE_LEN + self.payload.len());
        out.push(self.auth_type.as_u8());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&self.session_id.to_le_bytes());
        match (self.auth_type, &self.auth_code) {
            (AuthType::None, None) => {}
            (AuthType::None, Some(_)) => {
                return Err(Error::InvalidArgument("auth code present with auth type none"));
            }
            (_, Some(code)) => out.extend_from_slice(code),
            (_, None) => return Err(Error::InvalidArgument("missing v1.5 auth code")),
        }
        out.push(length);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    pub(crate) fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN_NO_AUTH {
            return Err(Error::Decoding("IPMI v1.5 session header too short"));
        }
        let auth_type = AuthType::from_u8(bytes[0])
            .filter(|a| *a != AuthType::RmcpPlus)
            .ok_or(Error::Decoding("unknown IPMI v1.5 authentication type"))?;
        let sequence = super::read_u32_le(bytes, 1)?;
        let session_id = super::read_u32_le(bytes, 5)?;

        let (auth_code, length_at) = if auth_type == AuthType::None {
            (None, 9)
        } else {
            let code: [u8; 16] = bytes
                .get(9..9 + AUTH_CODE_LEN)
                .and_then(|b| b.try_into().ok())
                .ok_or(Error::Decoding("IPMI v1.5 auth code truncated"))?;
            (Some(code), 9 + AUTH_CODE_LEN)
        };

        let declared = *bytes
            .get(length_at)
            .ok_or(Error::Decoding("IPMI v1.5 length byte missing"))? as usize;
        let payload = &bytes[length_at + 1..];
        if payload.len() != declared {
            return Err(Error::Decoding("IPMI v1.5 payload length mismatch"));
        }

        Ok(Self {
            auth_type,
            sequence,
            session_id,
            auth_code,
            payload: payload.to_vec(),
        })
    }

    /// Check the received auth code against the one we would compute.
    pub(crate) fn verify(&self, password: &[u8; 16]) -> Result<()> {
        let expected = auth_code_for(
            self.auth_type,
            self.session_id,
            self.sequence,
            password,
            &self.payload,
        )?;
        match (expected, self.auth_code) {
            (None, None) => Ok(()),
            (Some(a), Some(b)) if crate::crypto::ct_eq(&a, &b) => Ok(()),
            _ => Err(Error::IntegrityCheckFailed("IPMI v1.5 auth code mismatch")),
        }
    }
}

fn auth_code_for(
    auth_type: AuthType,
    session_id: u32,
    sequence: u32,
    password: &[u8; 16],
    payload: &[u8],
) -> Result<Option<[u8; 16]>> {
    match auth_type {
        AuthType::None => Ok(None),
        AuthType::Password => Ok(Some(*password)),
        AuthType::Md5 => Ok(Some(md5_auth_code(password, session_id, payload, sequence))),
        AuthType::Md2 | AuthType::Oem | AuthType::RmcpPlus => {
            Err(Error::NotSupported("IPMI v1.5 authentication type"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PW: [u8; 16] = *b"secret\0\0\0\0\0\0\0\0\0\0";

    #[test]
    fn none_auth_has_no_code() {
        let frame = LanFrame::seal(AuthType::None, 0, 0, &PW, vec![1, 2, 3]).expect("seal");
        let bytes = frame.pack().expect("pack");
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 1, 2, 3]);
        assert_eq!(LanFrame::unpack(&bytes).expect("unpack"), frame);
    }

    #[test]
    fn password_auth_round_trip() {
        let frame =
            LanFrame::seal(AuthType::Password, 0x0102_0304, 7, &PW, vec![0x20, 0x18]).expect("seal");
        let bytes = frame.pack().expect("pack");
        assert_eq!(bytes.len(), 26 + 2);
        assert_eq!(&bytes[1..5], &[7, 0, 0, 0]);
        assert_eq!(&bytes[5..9], &[4, 3, 2, 1]);
        assert_eq!(&bytes[9..25], &PW);
        let parsed = LanFrame::unpack(&bytes).expect("unpack");
        assert_eq!(parsed, frame);
        parsed.verify(&PW).expect("verify");
    }

    #[test]
    fn md5_auth_round_trip_and_verify() {
        let payload = vec![0x20, 0x18, 0xC8, 0x81, 0x04, 0x01, 0x7A];
        let frame = LanFrame::seal(AuthType::Md5, 0x0102_0304, 5, &PW, payload).expect("seal");
        let parsed = LanFrame::unpack(&frame.pack().expect("pack")).expect("unpack");
        assert_eq!(parsed, frame);
        parsed.verify(&PW).expect("verify");

        let mut wrong = PW;
        wrong[0] ^= 1;
        assert!(matches!(
            parsed.verify(&wrong),
            Err(Error::IntegrityCheckFailed(_))
        ));
    }

    #[test]
    fn unsupported_auth_types() {
        assert!(matches!(
            LanFrame::seal(AuthType::Md2, 0, 0, &PW, Vec::new()),
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(
            LanFrame::seal(AuthType::Oem, 0, 0, &PW, Vec::new()),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn length_must_match_exactly() {
        let bytes = LanFrame::seal(AuthType::None, 0, 0, &PW, vec![9; 4])
            .expect("seal")
            .pack()
            .expect("pack");
        let mut long = bytes.clone();
        long.push(0);
        assert!(LanFrame::unpack(&long).is_err());
        assert!(LanFrame::unpack(&bytes[..bytes.len() - 1]).is_err());
    }
}
