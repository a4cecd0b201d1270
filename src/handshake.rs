//! RMCP+ session establishment (Open Session + RAKP 1-4) as a sans-IO state machine.
//!
//! The machine emits the payload to send next and consumes the payload that
//! came back; framing and socket I/O belong to the caller. Any failure moves
//! it to [`HandshakeState::Failed`], after which it refuses further input.

use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::{SecretBytes, ct_eq, hmac_sha1, hmac_sha1_truncated_12};
use crate::error::{Error, Result};
use crate::protocol::rakp::{
    OpenSessionRequest, OpenSessionResponse, ROLE_NAME_ONLY_LOOKUP, Rakp1, Rakp2, Rakp3, Rakp4,
};
use crate::protocol::{algorithm, payload_type};
use crate::types::PrivilegeLevel;

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    Idle,
    OpenSessionSent,
    Rakp1Sent,
    Rakp3Sent,
    Established,
    Failed,
}

/// A payload the caller must send in a clear RMCP+ frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Outbound {
    pub(crate) payload_type: u8,
    pub(crate) payload: Vec<u8>,
}

/// Result of feeding one response into the machine.
#[derive(Debug)]
pub(crate) enum Step {
    Send(Outbound),
    Established(Established),
}

/// Key material produced by a completed handshake.
#[derive(Debug)]
pub(crate) struct Established {
    pub(crate) managed_session_id: u32,
    pub(crate) sik: Zeroizing<[u8; 20]>,
}

/// Console-chosen random values.
#[derive(Debug, Clone)]
pub(crate) struct Nonces {
    pub(crate) console_session_id: u32,
    pub(crate) console_random: [u8; 16],
    pub(crate) open_tag: u8,
    pub(crate) rakp1_tag: u8,
    pub(crate) rakp3_tag: u8,
}

impl Nonces {
    pub(crate) fn random() -> Self {
        let mut rng = rand::rng();
        let mut console_random = [0u8; 16];
        rng.fill_bytes(&mut console_random);
        let mut tags = [0u8; 3];
        rng.fill_bytes(&mut tags);
        // a zero console session ID is reserved
        let console_session_id = rng.next_u32().max(1);
        Self {
            console_session_id,
            console_random,
            open_tag: tags[0],
            rakp1_tag: tags[1],
            rakp3_tag: tags[2],
        }
    }
}

pub(crate) struct RakpHandshake {
    state: HandshakeState,
    nonces: Nonces,
    username: Vec<u8>,
    user_key: Zeroizing<[u8; 20]>,
    kg: Zeroizing<[u8; 20]>,
    privilege: PrivilegeLevel,
    managed_session_id: u32,
    managed_random: [u8; 16],
    managed_guid: [u8; 16],
    sik: Zeroizing<[u8; 20]>,
}

impl RakpHandshake {
    pub(crate) fn new(
        username: &[u8],
        password: &SecretBytes,
        bmc_key: Option<&SecretBytes>,
        privilege: PrivilegeLevel,
        nonces: Nonces,
    ) -> Self {
        let user_key = Zeroizing::new(password.to_key_sha1());
        let kg = Zeroizing::new(match bmc_key {
            Some(kg) if !kg.is_empty() => kg.to_key_sha1(),
            _ => *user_key,
        });
        Self {
            state: HandshakeState::Idle,
            nonces,
            username: username.to_vec(),
            user_key,
            kg,
            privilege,
            managed_session_id: 0,
            managed_random: [0u8; 16],
            managed_guid: [0u8; 16],
            sik: Zeroizing::new([0u8; 20]),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> HandshakeState {
        self.state
    }

    /// Emit the Open Session request.
    pub(crate) fn start(&mut self) -> Result<Outbound> {
        if self.state != HandshakeState::Idle {
            return Err(Error::Protocol("handshake already started"));
        }
        let request = OpenSessionRequest {
            message_tag: self.nonces.open_tag,
            max_privilege: self.privilege.as_u8(),
            console_session_id: self.nonces.console_session_id,
            auth_algorithm: algorithm::AUTH_RAKP_HMAC_SHA1,
            integrity_algorithm: algorithm::INTEGRITY_HMAC_SHA1_96,
            confidentiality_algorithm: algorithm::CONFIDENTIALITY_AES_CBC_128,
        };
        self.state = HandshakeState::OpenSessionSent;
        Ok(Outbound {
            payload_type: payload_type::OPEN_SESSION_REQUEST,
            payload: request.pack(),
        })
    }

    /// Consume the response to the last emitted payload.
    pub(crate) fn step(&mut self, received_type: u8, payload: &[u8]) -> Result<Step> {
        let result = match self.state {
            HandshakeState::OpenSessionSent => {
                expect_type(received_type, payload_type::OPEN_SESSION_RESPONSE)
                    .and_then(|()| self.on_open_session_response(payload))
            }
            HandshakeState::Rakp1Sent => expect_type(received_type, payload_type::RAKP_2)
                .and_then(|()| self.on_rakp2(payload)),
            HandshakeState::Rakp3Sent => expect_type(received_type, payload_type::RAKP_4)
                .and_then(|()| self.on_rakp4(payload)),
            HandshakeState::Idle => return Err(Error::Protocol("handshake not started")),
            HandshakeState::Established | HandshakeState::Failed => {
                return Err(Error::Protocol("handshake already finished"));
            }
        };
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }
        result
    }

    fn role(&self) -> u8 {
        self.privilege.as_u8() | ROLE_NAME_ONLY_LOOKUP
    }

    fn on_open_session_response(&mut self, payload: &[u8]) -> Result<Step> {
        let rsp = OpenSessionResponse::unpack(payload)?;
        if rsp.message_tag != self.nonces.open_tag {
            return Err(Error::Protocol("Open Session response message tag mismatch"));
        }
        if rsp.status_code != 0 {
            return Err(Error::protocol_owned(format!(
                "Open Session rejected by managed system (status {:#04x})",
                rsp.status_code
            )));
        }
        if rsp.console_session_id != self.nonces.console_session_id {
            return Err(Error::Protocol("Open Session console session id mismatch"));
        }
        if rsp.auth_algorithm != algorithm::AUTH_RAKP_HMAC_SHA1
            || rsp.integrity_algorithm != algorithm::INTEGRITY_HMAC_SHA1_96
            || rsp.confidentiality_algorithm != algorithm::CONFIDENTIALITY_AES_CBC_128
        {
            return Err(Error::NotSupported(
                "managed system selected an unsupported cipher suite",
            ));
        }
        self.managed_session_id = rsp.managed_session_id;

        let rakp1 = Rakp1 {
            message_tag: self.nonces.rakp1_tag,
            managed_session_id: self.managed_session_id,
            console_random: self.nonces.console_random,
            role: self.role(),
            username: self.username.clone(),
        };
        let payload = rakp1.pack()?;
        self.state = HandshakeState::Rakp1Sent;
        Ok(Step::Send(Outbound {
            payload_type: payload_type::RAKP_1,
            payload,
        }))
    }

    fn on_rakp2(&mut self, payload: &[u8]) -> Result<Step> {
        let rakp2 = Rakp2::unpack(payload, algorithm::AUTH_RAKP_HMAC_SHA1)?;
        if rakp2.message_tag != self.nonces.rakp1_tag {
            return Err(Error::Protocol("RAKP message 2 tag mismatch"));
        }
        if rakp2.status_code != 0 {
            return Err(Error::AuthenticationFailed("RAKP message 2 status != 0"));
        }
        if rakp2.console_session_id != self.nonces.console_session_id {
            return Err(Error::Protocol("RAKP message 2 console session id mismatch"));
        }
        self.managed_random = rakp2.managed_random;
        self.managed_guid = rakp2.managed_guid;

        let expected = self.rakp2_auth_code()?;
        if !ct_eq(&expected, &rakp2.key_exchange_auth_code) {
            return Err(Error::AuthenticationFailed(
                "RAKP message 2 authentication code mismatch",
            ));
        }

        self.sik = Zeroizing::new(self.session_integrity_key()?);

        let rakp3 = Rakp3 {
            message_tag: self.nonces.rakp3_tag,
            status_code: 0,
            managed_session_id: self.managed_session_id,
            key_exchange_auth_code: self.rakp3_auth_code()?.to_vec(),
        };
        self.state = HandshakeState::Rakp3Sent;
        Ok(Step::Send(Outbound {
            payload_type: payload_type::RAKP_3,
            payload: rakp3.pack(),
        }))
    }

    fn on_rakp4(&mut self, payload: &[u8]) -> Result<Step> {
        let rakp4 = Rakp4::unpack(payload, algorithm::AUTH_RAKP_HMAC_SHA1)?;
        if rakp4.message_tag != self.nonces.rakp3_tag {
            return Err(Error::Protocol("RAKP message 4 tag mismatch"));
        }
        if rakp4.status_code != 0 {
            return Err(Error::AuthenticationFailed("RAKP message 4 status != 0"));
        }
        if rakp4.console_session_id != self.nonces.console_session_id {
            return Err(Error::Protocol("RAKP message 4 console session id mismatch"));
        }

        let expected = self.rakp4_integrity_check_value()?;
        if !ct_eq(&expected, &rakp4.integrity_check_value) {
            return Err(Error::IntegrityCheckFailed(
                "RAKP message 4 integrity check value mismatch",
            ));
        }

        self.state = HandshakeState::Established;
        Ok(Step::Established(Established {
            managed_session_id: self.managed_session_id,
            sik: self.sik.clone(),
        }))
    }

    /// HMAC(Kuid, SIDm || SIDc || Rm || Rc || GUIDc || role || ULen || UName)
    fn rakp2_auth_code(&self) -> Result<[u8; 20]> {
        let mut data = Vec::with_capacity(58 + self.username.len());
        data.extend_from_slice(&self.nonces.console_session_id.to_le_bytes());
        data.extend_from_slice(&self.managed_session_id.to_le_bytes());
        data.extend_from_slice(&self.nonces.console_random);
        data.extend_from_slice(&self.managed_random);
        data.extend_from_slice(&self.managed_guid);
        self.push_role_and_name(&mut data);
        hmac_sha1(&*self.user_key, &data)
    }

    /// HMAC(Kuid, Rc || SIDm || role || ULen || UName)
    fn rakp3_auth_code(&self) -> Result<[u8; 20]> {
        let mut data = Vec::with_capacity(22 + self.username.len());
        data.extend_from_slice(&self.managed_random);
        data.extend_from_slice(&self.nonces.console_session_id.to_le_bytes());
        self.push_role_and_name(&mut data);
        hmac_sha1(&*self.user_key, &data)
    }

    /// HMAC(Kg, Rm || Rc || role || ULen || UName)
    fn session_integrity_key(&self) -> Result<[u8; 20]> {
        let mut data = Vec::with_capacity(34 + self.username.len());
        data.extend_from_slice(&self.nonces.console_random);
        data.extend_from_slice(&self.managed_random);
        self.push_role_and_name(&mut data);
        hmac_sha1(&*self.kg, &data)
    }

    /// HMAC-SHA1-96(SIK, Rm || SIDc || GUIDc)
    fn rakp4_integrity_check_value(&self) -> Result<[u8; 12]> {
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(&self.nonces.console_random);
        data.extend_from_slice(&self.managed_session_id.to_le_bytes());
        data.extend_from_slice(&self.managed_guid);
        hmac_sha1_truncated_12(&*self.sik, &data)
    }

    fn push_role_and_name(&self, data: &mut Vec<u8>) {
        data.push(self.role());
        data.push(self.username.len() as u8);
        data.extend_from_slice(&self.username);
    }
}

fn expect_type(received: u8, expected: u8) -> Result<()> {
    if received == expected {
        Ok(())
    } else {
        Err(Error::protocol_owned(format!(
            "unexpected RMCP+ payload type {received:#04x} (expected {expected:#04x})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SessionKeys;

    const CONSOLE_SID: u32 = 0xA4A3A2A1;
    const MANAGED_SID: u32 = 0x11223344;

    const RAKP2_CODE: [u8; 20] = [
        0x00, 0x84, 0x9E, 0x3F, 0xCF, 0x24, 0xB8, 0xCE, 0x89, 0xDD, 0x24, 0xF9, 0x36, 0x35, 0x6F,
        0x1F, 0x15, 0x65, 0x46, 0x30,
    ];
    const RAKP3_CODE: [u8; 20] = [
        0x58, 0xEE, 0x1B, 0xB6, 0x0B, 0x2E, 0xFC, 0x25, 0x3C, 0x06, 0xB6, 0xC3, 0xB2, 0x78, 0x4B,
        0x10, 0x5E, 0xAA, 0xF8, 0x15,
    ];
    const SIK: [u8; 20] = [
        0xA3, 0x9A, 0xE2, 0xB1, 0x60, 0xA1, 0xE5, 0xEF, 0xE0, 0x17, 0xFF, 0xD6, 0xEC, 0x1A, 0x4F,
        0xF8, 0xEE, 0xAC, 0x6F, 0x54,
    ];
    const ICV: [u8; 12] = [
        0xA1, 0x3B, 0xDB, 0x9C, 0x88, 0xB2, 0xCD, 0xAE, 0x6B, 0x84, 0x4D, 0xCA,
    ];
    const K1: [u8; 20] = [
        0x58, 0xDB, 0xC1, 0xAF, 0xA0, 0x0E, 0xB3, 0xF9, 0x48, 0x7C, 0x9E, 0xAE, 0xF0, 0xDC, 0x78,
        0x92, 0xCC, 0x43, 0xE4, 0x96,
    ];
    const K2: [u8; 20] = [
        0x8B, 0xD9, 0xB8, 0xCE, 0x06, 0x74, 0xB5, 0xD7, 0x45, 0xCE, 0xD9, 0x1E, 0x72, 0x8A, 0xC1,
        0xA5, 0x14, 0x64, 0xFC, 0xAF,
    ];

    fn seq16(start: u8) -> [u8; 16] {
        core::array::from_fn(|i| start + i as u8)
    }

    fn nonces() -> Nonces {
        Nonces {
            console_session_id: CONSOLE_SID,
            console_random: seq16(0x00),
            open_tag: 0x01,
            rakp1_tag: 0x02,
            rakp3_tag: 0x03,
        }
    }

    fn handshake(password: &str) -> RakpHandshake {
        RakpHandshake::new(
            b"admin",
            &SecretBytes::new(password.as_bytes().to_vec()),
            None,
            PrivilegeLevel::Administrator,
            nonces(),
        )
    }

    fn open_session_response() -> Vec<u8> {
        OpenSessionResponse {
            message_tag: 0x01,
            status_code: 0,
            max_privilege: 0x04,
            console_session_id: CONSOLE_SID,
            managed_session_id: MANAGED_SID,
            auth_algorithm: algorithm::AUTH_RAKP_HMAC_SHA1,
            integrity_algorithm: algorithm::INTEGRITY_HMAC_SHA1_96,
            confidentiality_algorithm: algorithm::CONFIDENTIALITY_AES_CBC_128,
        }
        .pack()
    }

    fn rakp2(managed_random: [u8; 16], managed_guid: [u8; 16]) -> Vec<u8> {
        Rakp2 {
            message_tag: 0x02,
            status_code: 0,
            console_session_id: CONSOLE_SID,
            managed_random,
            managed_guid,
            key_exchange_auth_code: RAKP2_CODE.to_vec(),
        }
        .pack()
    }

    fn rakp4(icv: [u8; 12]) -> Vec<u8> {
        Rakp4 {
            message_tag: 0x03,
            status_code: 0,
            console_session_id: CONSOLE_SID,
            integrity_check_value: icv.to_vec(),
        }
        .pack()
    }

    fn advance_to_rakp1(hs: &mut RakpHandshake) -> Outbound {
        hs.start().expect("start");
        match hs
            .step(payload_type::OPEN_SESSION_RESPONSE, &open_session_response())
            .expect("open session")
        {
            Step::Send(out) => out,
            Step::Established(_) => panic!("unexpected completion"),
        }
    }

    #[test]
    fn completes_with_fixture_keys() {
        let mut hs = handshake("secret");
        let open = hs.start().expect("start");
        assert_eq!(open.payload_type, payload_type::OPEN_SESSION_REQUEST);
        assert_eq!(hs.state(), HandshakeState::OpenSessionSent);

        let rakp1 = match hs
            .step(payload_type::OPEN_SESSION_RESPONSE, &open_session_response())
            .expect("open")
        {
            Step::Send(out) => out,
            Step::Established(_) => panic!("unexpected completion"),
        };
        assert_eq!(rakp1.payload_type, payload_type::RAKP_1);
        let parsed = Rakp1::unpack(&rakp1.payload).expect("rakp1");
        assert_eq!(parsed.role, 0x14);
        assert_eq!(parsed.managed_session_id, MANAGED_SID);

        let rakp3 = match hs
            .step(payload_type::RAKP_2, &rakp2(seq16(0x10), seq16(0x20)))
            .expect("rakp2")
        {
            Step::Send(out) => out,
            Step::Established(_) => panic!("unexpected completion"),
        };
        let parsed = Rakp3::unpack(&rakp3.payload).expect("rakp3");
        assert_eq!(parsed.key_exchange_auth_code, RAKP3_CODE.to_vec());
        assert_eq!(hs.state(), HandshakeState::Rakp3Sent);

        let est = match hs.step(payload_type::RAKP_4, &rakp4(ICV)).expect("rakp4") {
            Step::Established(est) => est,
            Step::Send(_) => panic!("expected completion"),
        };
        assert_eq!(est.managed_session_id, MANAGED_SID);
        assert_eq!(*est.sik, SIK);
        assert_eq!(hs.state(), HandshakeState::Established);

        let keys = SessionKeys::derive(&est.sik).expect("keys");
        assert_eq!(keys.k1(), &K1);
        assert_eq!(keys.k2(), &K2);
        assert_ne!(keys.k1(), keys.k2());
    }

    #[test]
    fn wrong_password_fails_rakp2() {
        let mut hs = handshake("Secret");
        advance_to_rakp1(&mut hs);
        let err = hs
            .step(payload_type::RAKP_2, &rakp2(seq16(0x10), seq16(0x20)))
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed(_)));
        assert_eq!(hs.state(), HandshakeState::Failed);
        assert!(hs.step(payload_type::RAKP_4, &rakp4(ICV)).is_err());
    }

    #[test]
    fn flipped_managed_random_or_guid_fails_rakp2() {
        let mut rc = seq16(0x10);
        rc[5] ^= 0x80;
        let mut hs = handshake("secret");
        advance_to_rakp1(&mut hs);
        assert!(matches!(
            hs.step(payload_type::RAKP_2, &rakp2(rc, seq16(0x20))),
            Err(Error::AuthenticationFailed(_))
        ));

        let mut guid = seq16(0x20);
        guid[15] ^= 0x01;
        let mut hs = handshake("secret");
        advance_to_rakp1(&mut hs);
        assert!(matches!(
            hs.step(payload_type::RAKP_2, &rakp2(seq16(0x10), guid)),
            Err(Error::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn flipped_icv_fails_rakp4() {
        let mut hs = handshake("secret");
        advance_to_rakp1(&mut hs);
        hs.step(payload_type::RAKP_2, &rakp2(seq16(0x10), seq16(0x20)))
            .expect("rakp2");
        let mut icv = ICV;
        icv[0] ^= 0x01;
        assert!(matches!(
            hs.step(payload_type::RAKP_4, &rakp4(icv)),
            Err(Error::IntegrityCheckFailed(_))
        ));
        assert_eq!(hs.state(), HandshakeState::Failed);
    }

    #[test]
    fn rejects_other_cipher_suites() {
        let mut hs = handshake("secret");
        hs.start().expect("start");
        let mut rsp = OpenSessionResponse::unpack(&open_session_response()).expect("parse");
        rsp.confidentiality_algorithm = algorithm::CONFIDENTIALITY_NONE;
        assert!(matches!(
            hs.step(payload_type::OPEN_SESSION_RESPONSE, &rsp.pack()),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn rejects_echo_mismatches() {
        let mut hs = handshake("secret");
        hs.start().expect("start");
        let mut rsp = OpenSessionResponse::unpack(&open_session_response()).expect("parse");
        rsp.console_session_id ^= 1;
        assert!(matches!(
            hs.step(payload_type::OPEN_SESSION_RESPONSE, &rsp.pack()),
            Err(Error::Protocol(_))
        ));

        let mut hs = handshake("secret");
        hs.start().expect("start");
        assert!(hs.step(payload_type::RAKP_2, &open_session_response()).is_err());
        assert_eq!(hs.state(), HandshakeState::Failed);
    }

    #[test]
    fn bmc_key_changes_only_the_sik() {
        let mut hs = RakpHandshake::new(
            b"admin",
            &SecretBytes::new(b"secret".to_vec()),
            Some(&SecretBytes::new(b"kg-key".to_vec())),
            PrivilegeLevel::Administrator,
            nonces(),
        );
        advance_to_rakp1(&mut hs);
        let rakp3 = match hs
            .step(payload_type::RAKP_2, &rakp2(seq16(0x10), seq16(0x20)))
            .expect("rakp2 still verifies with the user key")
        {
            Step::Send(out) => out,
            Step::Established(_) => panic!("unexpected completion"),
        };
        assert_eq!(
            Rakp3::unpack(&rakp3.payload).expect("rakp3").key_exchange_auth_code,
            RAKP3_CODE.to_vec()
        );
        // ICV is keyed by the SIK, which now derives from Kg
        assert!(matches!(
            hs.step(payload_type::RAKP_4, &rakp4(ICV)),
            Err(Error::IntegrityCheckFailed(_))
        ));
    }
}
