//! In-memory BMC answering over the [`Transport`] trait.
//!
//! It speaks enough of RMCP, ASF, IPMI v1.5 and RMCP+ (including the RAKP
//! responder side and SOL) to drive the client end to end.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::crypto::{SessionKeys, hmac_sha1, hmac_sha1_truncated_12, normalize_key};
use crate::error::{Error, Result};
use crate::ipmb::{IpmbHeader, encode_response};
use crate::protocol::asf::{ASF_IANA, AsfMessage, AsfPong};
use crate::protocol::lan::LanFrame;
use crate::protocol::lanplus::LanPlusFrame;
use crate::protocol::payload_type;
use crate::protocol::rakp::{
    OpenSessionRequest, OpenSessionResponse, Rakp1, Rakp2, Rakp3, Rakp4,
};
use crate::protocol::rmcp::{MessageClass, RMCP_SEQ_NO_ACK, RmcpMessage};
use crate::protocol::sol::SolPacket;
use crate::transport::Transport;
use crate::types::AuthType;

pub(crate) const MANAGED_SID: u32 = 0x0A0B_0C0D;
pub(crate) const TEMPORARY_SID: u32 = 0x0102_0304;
pub(crate) const V15_SID: u32 = 0x0506_0708;
const MANAGED_RANDOM: [u8; 16] = [0x42; 16];
const MANAGED_GUID: [u8; 16] = [0x24; 16];
const CHALLENGE: [u8; 16] = [0x5C; 16];

/// How a reply is framed.
#[derive(Clone, Copy)]
enum Via {
    Lan { auth_type: AuthType, session_id: u32 },
    LanPlus,
}

#[derive(Default)]
struct Rakp {
    console_session_id: u32,
    console_random: [u8; 16],
    role: u8,
    username: Vec<u8>,
}

struct State {
    password: Vec<u8>,
    rmcp_plus: bool,
    auth_type: AuthType,
    silent: bool,
    stray_before_next_reply: bool,
    outbox: VecDeque<Vec<u8>>,
    commands: Vec<(u8, u8)>,
    rakp: Rakp,
    keys: Option<SessionKeys>,
    outbound_sequence: u32,
    sol_console_sent: bool,
    sol_packets: Vec<SolPacket>,
}

/// Cloneable handle; clones share one BMC.
#[derive(Clone)]
pub(crate) struct FakeBmc {
    state: Arc<Mutex<State>>,
}

impl FakeBmc {
    fn with(password: &str, rmcp_plus: bool, auth_type: AuthType) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                password: password.as_bytes().to_vec(),
                rmcp_plus,
                auth_type,
                silent: false,
                stray_before_next_reply: false,
                outbox: VecDeque::new(),
                commands: Vec::new(),
                rakp: Rakp::default(),
                keys: None,
                outbound_sequence: 0,
                sol_console_sent: false,
                sol_packets: Vec::new(),
            })),
        }
    }

    /// A BMC advertising IPMI v2.0 with `password` configured for every user.
    pub(crate) fn rmcp_plus(password: &str) -> Self {
        Self::with(password, true, AuthType::None)
    }

    /// A legacy BMC offering IPMI v1.5 sessions under `auth_type`.
    pub(crate) fn v15(auth_type: AuthType, password: &str) -> Self {
        Self::with(password, false, auth_type)
    }

    /// A BMC advertising neither IPMI version.
    pub(crate) fn unsupported() -> Self {
        let bmc = Self::with("", false, AuthType::None);
        bmc.state().auth_type = AuthType::Oem;
        bmc
    }

    pub(crate) fn set_silent(&self, silent: bool) {
        self.state().silent = silent;
    }

    /// Precede the next IPMI reply with a reply to some other request.
    pub(crate) fn send_stray_reply(&self) {
        self.state().stray_before_next_reply = true;
    }

    /// Number of IPMI requests seen for `netfn`/`cmd`.
    pub(crate) fn count(&self, netfn: u8, cmd: u8) -> usize {
        self.state()
            .commands
            .iter()
            .filter(|&&c| c == (netfn, cmd))
            .count()
    }

    pub(crate) fn has_keys(&self) -> bool {
        self.state().keys.is_some()
    }

    pub(crate) fn sol_packets(&self) -> Vec<SolPacket> {
        self.state().sol_packets.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Transport for FakeBmc {
    fn send(&self, datagram: &[u8]) -> Result<()> {
        self.state().handle(datagram);
        Ok(())
    }

    fn recv(&self) -> Result<Vec<u8>> {
        self.state().outbox.pop_front().ok_or(Error::Timeout)
    }

    fn set_timeout(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

impl State {
    fn handle(&mut self, datagram: &[u8]) {
        if self.silent {
            return;
        }
        let rmcp = RmcpMessage::unpack(datagram).expect("client sent a valid RMCP message");
        match rmcp.class {
            MessageClass::Asf => {
                let AsfMessage::Ping { tag } = AsfMessage::unpack(&rmcp.payload).expect("asf")
                else {
                    panic!("client sent an ASF pong");
                };
                let pong = AsfMessage::Pong {
                    tag,
                    body: AsfPong {
                        oem_iana: ASF_IANA,
                        oem_defined: 0,
                        supported_entities: 0x81,
                        supported_interactions: 0,
                    },
                };
                self.outbox
                    .push_back(RmcpMessage::new(RMCP_SEQ_NO_ACK, MessageClass::Asf, pong.pack()).pack());
            }
            MessageClass::Ipmi if rmcp.payload[0] == AuthType::RmcpPlus.as_u8() => {
                let frame = LanPlusFrame::unpack(&rmcp.payload, self.keys.as_ref())
                    .expect("client sent a valid RMCP+ frame");
                self.on_rmcp_plus(frame);
            }
            MessageClass::Ipmi => {
                let frame = LanFrame::unpack(&rmcp.payload).expect("client sent a valid v1.5 frame");
                if frame.auth_type != AuthType::None {
                    frame
                        .verify(&normalize_key::<16>(&self.password))
                        .expect("client auth code verifies");
                }
                let via = Via::Lan {
                    auth_type: frame.auth_type,
                    session_id: frame.session_id,
                };
                self.on_ipmi(&frame.payload, via);
            }
            MessageClass::Oem => panic!("client sent an OEM message"),
        }
    }

    fn on_rmcp_plus(&mut self, frame: LanPlusFrame) {
        match frame.payload_type {
            payload_type::OPEN_SESSION_REQUEST => {
                let req = OpenSessionRequest::unpack(&frame.payload).expect("open session");
                self.rakp.console_session_id = req.console_session_id;
                let rsp = OpenSessionResponse {
                    message_tag: req.message_tag,
                    status_code: 0,
                    max_privilege: req.max_privilege,
                    console_session_id: req.console_session_id,
                    managed_session_id: MANAGED_SID,
                    auth_algorithm: req.auth_algorithm,
                    integrity_algorithm: req.integrity_algorithm,
                    confidentiality_algorithm: req.confidentiality_algorithm,
                };
                self.reply_clear(payload_type::OPEN_SESSION_RESPONSE, rsp.pack());
            }
            payload_type::RAKP_1 => {
                let rakp1 = Rakp1::unpack(&frame.payload).expect("rakp1");
                assert_eq!(rakp1.managed_session_id, MANAGED_SID);
                self.rakp.console_random = rakp1.console_random;
                self.rakp.role = rakp1.role;
                self.rakp.username = rakp1.username;

                let mut data = Vec::new();
                data.extend_from_slice(&self.rakp.console_session_id.to_le_bytes());
                data.extend_from_slice(&MANAGED_SID.to_le_bytes());
                data.extend_from_slice(&self.rakp.console_random);
                data.extend_from_slice(&MANAGED_RANDOM);
                data.extend_from_slice(&MANAGED_GUID);
                self.push_role_and_name(&mut data);
                let code = hmac_sha1(&self.user_key(), &data).expect("hmac");

                let rsp = Rakp2 {
                    message_tag: rakp1.message_tag,
                    status_code: 0,
                    console_session_id: self.rakp.console_session_id,
                    managed_random: MANAGED_RANDOM,
                    managed_guid: MANAGED_GUID,
                    key_exchange_auth_code: code.to_vec(),
                };
                self.reply_clear(payload_type::RAKP_2, rsp.pack());
            }
            payload_type::RAKP_3 => {
                let rakp3 = Rakp3::unpack(&frame.payload).expect("rakp3");
                let mut data = Vec::new();
                data.extend_from_slice(&MANAGED_RANDOM);
                data.extend_from_slice(&self.rakp.console_session_id.to_le_bytes());
                self.push_role_and_name(&mut data);
                let expected = hmac_sha1(&self.user_key(), &data).expect("hmac");
                assert_eq!(rakp3.key_exchange_auth_code, expected.to_vec());

                let mut data = Vec::new();
                data.extend_from_slice(&self.rakp.console_random);
                data.extend_from_slice(&MANAGED_RANDOM);
                self.push_role_and_name(&mut data);
                let sik = hmac_sha1(&self.user_key(), &data).expect("sik");

                let mut data = Vec::new();
                data.extend_from_slice(&self.rakp.console_random);
                data.extend_from_slice(&MANAGED_SID.to_le_bytes());
                data.extend_from_slice(&MANAGED_GUID);
                let icv = hmac_sha1_truncated_12(&sik, &data).expect("icv");

                let rsp = Rakp4 {
                    message_tag: rakp3.message_tag,
                    status_code: 0,
                    console_session_id: self.rakp.console_session_id,
                    integrity_check_value: icv.to_vec(),
                };
                self.reply_clear(payload_type::RAKP_4, rsp.pack());
                self.keys = Some(SessionKeys::derive(&sik).expect("keys"));
            }
            payload_type::IPMI => {
                assert!(frame.encrypted && frame.authenticated);
                assert_eq!(frame.session_id, MANAGED_SID);
                self.on_ipmi(&frame.payload, Via::LanPlus);
            }
            payload_type::SOL => {
                let packet = SolPacket::unpack(&frame.payload).expect("sol");
                self.sol_packets.push(packet.clone());
                let reply = if !self.sol_console_sent && !packet.data.is_empty() {
                    self.sol_console_sent = true;
                    SolPacket {
                        sequence: 1,
                        ack_sequence: packet.sequence,
                        accepted_chars: packet.data.len() as u8,
                        status: 0,
                        data: b"login: ".to_vec(),
                    }
                } else {
                    SolPacket {
                        sequence: 0,
                        ack_sequence: packet.sequence,
                        accepted_chars: packet.data.len() as u8,
                        status: 0,
                        data: Vec::new(),
                    }
                };
                self.reply(payload_type::SOL, Via::LanPlus, reply.pack());
            }
            other => panic!("unexpected RMCP+ payload type {other:#04x}"),
        }
    }

    fn on_ipmi(&mut self, msg: &[u8], via: Via) {
        let header = IpmbHeader::decode(msg).expect("ipmb header");
        let data = &msg[6..msg.len() - 1];
        self.commands.push((header.netfn, header.cmd_id));

        let body: Vec<u8> = match (header.netfn, header.cmd_id) {
            (0x06, 0x01) => vec![
                0x00, 0x20, 0x01, 0x02, 0x43, 0x02, 0x00, 0xA2, 0x02, 0x00, 0x00, 0x01,
            ],
            (0x06, 0x38) => self.capabilities(),
            (0x06, 0x39) => {
                assert_eq!(data[0], self.auth_type.as_u8());
                let mut body = vec![0x00];
                body.extend_from_slice(&TEMPORARY_SID.to_le_bytes());
                body.extend_from_slice(&CHALLENGE);
                body
            }
            (0x06, 0x3A) => {
                assert_eq!(&data[2..18], &CHALLENGE);
                let mut body = vec![0x00, self.auth_type.as_u8()];
                body.extend_from_slice(&V15_SID.to_le_bytes());
                body.extend_from_slice(&0x100u32.to_le_bytes());
                body.push(0x04);
                body
            }
            (0x06, 0x3B) => vec![0x00, data[0]],
            (0x06, 0x3C) => vec![0x00],
            (0x06, 0x48) => vec![
                0x00, 0, 0, 0, 0, 0xFF, 0x00, 0xFF, 0x00, 0x6F, 0x02, 0xFF, 0xFF,
            ],
            (0x06, 0x49) => vec![0x00],
            _ => vec![0xC1],
        };

        if self.stray_before_next_reply {
            self.stray_before_next_reply = false;
            let other = IpmbHeader {
                rq_seq: (header.rq_seq + 7) & 0x3F,
                ..header
            };
            self.reply(payload_type::IPMI, via, encode_response(&other, &[0x00, 0xEE]));
        }
        self.reply(payload_type::IPMI, via, encode_response(&header, &body));
    }

    fn capabilities(&self) -> Vec<u8> {
        let enabled = match self.auth_type {
            AuthType::None => 0x01,
            AuthType::Md5 => 0x04,
            AuthType::Password => 0x10,
            _ => 0x00,
        };
        let versions = if self.rmcp_plus {
            0x02
        } else if self.auth_type == AuthType::Oem {
            0x00
        } else {
            0x01
        };
        vec![0x00, 0x01, 0x80 | enabled, 0x04, versions, 0x00, 0x00, 0x00, 0x00]
    }

    fn user_key(&self) -> [u8; 20] {
        normalize_key::<20>(&self.password)
    }

    fn push_role_and_name(&self, data: &mut Vec<u8>) {
        data.push(self.rakp.role);
        data.push(self.rakp.username.len() as u8);
        data.extend_from_slice(&self.rakp.username);
    }

    fn reply_clear(&mut self, kind: u8, payload: Vec<u8>) {
        let frame = LanPlusFrame::clear(kind, payload).pack(None).expect("pack");
        self.push(frame);
    }

    fn reply(&mut self, kind: u8, via: Via, payload: Vec<u8>) {
        self.outbound_sequence = self.outbound_sequence.wrapping_add(1);
        let frame = match via {
            Via::LanPlus => LanPlusFrame::protected(
                kind,
                self.rakp.console_session_id,
                self.outbound_sequence,
                payload,
            )
            .pack(self.keys.as_ref())
            .expect("pack"),
            Via::Lan {
                auth_type,
                session_id,
            } => LanFrame::seal(
                auth_type,
                session_id,
                self.outbound_sequence,
                &normalize_key::<16>(&self.password),
                payload,
            )
            .and_then(|frame| frame.pack())
            .expect("pack"),
        };
        self.push(frame);
    }

    fn push(&mut self, frame: Vec<u8>) {
        self.outbox
            .push_back(RmcpMessage::new(RMCP_SEQ_NO_ACK, MessageClass::Ipmi, frame).pack());
    }
}
