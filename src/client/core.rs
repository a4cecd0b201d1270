use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::ipmb::{self, IpmbHeader};
use crate::protocol::asf::{AsfMessage, AsfPong};
use crate::protocol::lan::LanFrame;
use crate::protocol::lanplus::LanPlusFrame;
use crate::protocol::payload_type;
use crate::protocol::rmcp::{MessageClass, RmcpMessage, RmcpSequence};
use crate::protocol::sol::SolPacket;
use crate::session::Session;
use crate::types::{AuthType, RawResponse, Target};

const CMD_SEND_MESSAGE: u8 = 0x34;
const ASF_TAG_UNIDIRECTIONAL: u8 = 0xFF;

/// Addressing and counters shared by every request a client issues.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CoreConfig {
    pub(crate) requester_address: u8,
    pub(crate) bmc_address: u8,
    pub(crate) initial_rmcp_sequence: u8,
}

/// Framing state of one client: session, counters and the pending-reply queue.
///
/// Performs no I/O; callers send what it builds and feed back what arrives.
#[derive(Debug)]
pub(crate) struct ClientCore {
    session: Option<Session>,
    rmcp_seq: RmcpSequence,
    rq_seq: u8,
    asf_tag: u8,
    requester_address: u8,
    bmc_address: u8,
    pending: VecDeque<Vec<u8>>,
}

impl ClientCore {
    pub(crate) fn new(config: CoreConfig) -> Self {
        Self {
            session: None,
            rmcp_seq: RmcpSequence::new(config.initial_rmcp_sequence),
            rq_seq: 0,
            asf_tag: 0,
            requester_address: config.requester_address,
            bmc_address: config.bmc_address,
            pending: VecDeque::new(),
        }
    }

    pub(crate) fn bmc_target(&self) -> Target {
        Target::new(self.bmc_address)
    }

    pub(crate) fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    pub(crate) fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
    }

    pub(crate) fn is_session_active(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_activated)
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Build an ASF Presence Ping; returns its message tag and the datagram.
    pub(crate) fn ping_request(&mut self) -> (u8, Vec<u8>) {
        let tag = self.asf_tag;
        self.asf_tag = self.asf_tag.wrapping_add(1);
        if self.asf_tag == ASF_TAG_UNIDIRECTIONAL {
            self.asf_tag = 0;
        }
        let ping = AsfMessage::Ping { tag };
        let datagram =
            RmcpMessage::new(self.rmcp_seq.advance(), MessageClass::Asf, ping.pack()).pack();
        (tag, datagram)
    }

    /// Decode the Presence Pong answering the ping tagged `tag`.
    pub(crate) fn parse_pong(&self, tag: u8, datagram: &[u8]) -> Result<AsfPong> {
        let rmcp = RmcpMessage::unpack(datagram)?;
        if rmcp.class != MessageClass::Asf {
            return Err(Error::Decoding("expected an ASF class RMCP message"));
        }
        match AsfMessage::unpack(&rmcp.payload)? {
            AsfMessage::Pong { tag: got, body } if got == tag => Ok(body),
            AsfMessage::Pong { .. } => Err(Error::Protocol("ASF pong message tag mismatch")),
            AsfMessage::Ping { .. } => Err(Error::Protocol("expected an ASF pong")),
        }
    }

    /// Encode an IPMB request for `target`, bridged when it has a routing path.
    pub(crate) fn build_request(
        &mut self,
        target: &Target,
        lun: u8,
        netfn: u8,
        cmd: u8,
        data: &[u8],
    ) -> Result<(IpmbHeader, Vec<u8>)> {
        self.rq_seq = (self.rq_seq + 1) & 0x3F;
        let header = IpmbHeader {
            rs_sa: target.ipmb_address,
            netfn,
            rs_lun: lun & 0x03,
            rq_sa: self.requester_address,
            rq_seq: self.rq_seq,
            rq_lun: 0,
            cmd_id: cmd,
        };
        let msg = if target.is_bridged() {
            ipmb::encode_bridged_message(&target.routing, &header, data, self.rq_seq)?
        } else {
            ipmb::encode_ipmb_msg(&header, data)
        };
        Ok((header, msg))
    }

    /// Wrap `payload` in the session frame the current session calls for, then in RMCP.
    ///
    /// Without a session, IPMI payloads go out as unauthenticated v1.5 frames
    /// and session-setup payloads as clear RMCP+ frames. The session sequence
    /// number is only peeked; call [`Self::commit_sent`] once the datagram is out.
    pub(crate) fn frame(&mut self, kind: u8, payload: Vec<u8>) -> Result<Vec<u8>> {
        let frame = match &self.session {
            Some(session) if session.is_rmcp_plus() => {
                let keys = session
                    .keys()
                    .ok_or(Error::Protocol("RMCP+ session has no keys installed"))?;
                LanPlusFrame::protected(
                    kind,
                    session.session_id(),
                    session.next_sequence_number(),
                    payload,
                )
                .pack(Some(keys))?
            }
            Some(session) if kind == payload_type::IPMI => LanFrame::seal(
                session.auth_type().unwrap_or(AuthType::None),
                session.session_id(),
                session.next_sequence_number(),
                &session.password().to_key_v15(),
                payload,
            )?
            .pack()?,
            None if kind == payload_type::IPMI => LanFrame {
                auth_type: AuthType::None,
                sequence: 0,
                session_id: 0,
                auth_code: None,
                payload,
            }
            .pack()?,
            Some(_) => {
                return Err(Error::NotSupported(
                    "IPMI v1.5 sessions carry only IPMI payloads",
                ));
            }
            None => LanPlusFrame::clear(kind, payload).pack(None)?,
        };
        Ok(RmcpMessage::new(self.rmcp_seq.advance(), MessageClass::Ipmi, frame).pack())
    }

    /// Advance the session sequence number after a successful send.
    pub(crate) fn commit_sent(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.increment_sequence_number();
        }
    }

    /// Strip RMCP and session framing; returns the payload type and payload.
    ///
    /// v1.5 frames carrying an auth code are verified against the session password.
    pub(crate) fn unwrap(&self, datagram: &[u8]) -> Result<(u8, Vec<u8>)> {
        let rmcp = RmcpMessage::unpack(datagram)?;
        if rmcp.class != MessageClass::Ipmi {
            return Err(Error::Decoding("expected an IPMI class RMCP message"));
        }
        let first = *rmcp
            .payload
            .first()
            .ok_or(Error::Decoding("empty IPMI session frame"))?;

        if first & 0x0F == AuthType::RmcpPlus.as_u8() {
            let keys = self.session.as_ref().and_then(Session::keys);
            let frame = LanPlusFrame::unpack(&rmcp.payload, keys)?;
            return Ok((frame.payload_type, frame.payload));
        }

        let frame = LanFrame::unpack(&rmcp.payload)?;
        if frame.auth_type != AuthType::None {
            if let Some(session) = &self.session {
                frame.verify(&session.password().to_key_v15())?;
            }
        }
        Ok((payload_type::IPMI, frame.payload))
    }

    /// Answer `header` from the pending queue, if a matching reply is waiting.
    pub(crate) fn take_pending(&mut self, header: &IpmbHeader) -> Result<Option<RawResponse>> {
        match self
            .pending
            .iter()
            .position(|rx| ipmb::rx_filter(header, rx))
        {
            Some(index) => match self.pending.remove(index) {
                Some(rx) => ipmb::response_body(&rx).map(Some),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Feed a received datagram into the transaction for `header`.
    ///
    /// Returns the response once it arrives. Replies to other requests are
    /// queued for later transactions and never dropped.
    pub(crate) fn accept(
        &mut self,
        header: &IpmbHeader,
        datagram: &[u8],
    ) -> Result<Option<RawResponse>> {
        let (received_type, msg) = self.unwrap(datagram)?;
        if received_type != payload_type::IPMI {
            crate::observe::unexpected_payload(received_type);
            return Ok(None);
        }

        let msg = if msg.len() > 5 && msg[5] == CMD_SEND_MESSAGE {
            let inner = ipmb::decode_bridged_message(&msg)?;
            if inner.is_empty() {
                // the bridge acknowledged; the target's reply comes later
                return Ok(None);
            }
            inner
        } else {
            msg
        };

        if ipmb::rx_filter(header, &msg) {
            ipmb::response_body(&msg).map(Some)
        } else {
            self.pending.push_back(msg);
            Ok(None)
        }
    }

    /// IPMB request addressed to the BMC, for direct RMCP+ exchanges.
    pub(crate) fn build_bmc_request(
        &mut self,
        lun: u8,
        netfn: u8,
        cmd: u8,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        let target = self.bmc_target();
        self.build_request(&target, lun, netfn, cmd, data)
            .map(|(_, msg)| msg)
    }

    /// Decode a reply received in a direct RMCP+ exchange.
    pub(crate) fn bmc_response(msg: &[u8]) -> Result<RawResponse> {
        ipmb::verify_checksums(msg)?;
        ipmb::response_body(msg)
    }

    /// Frame a SOL packet for the active RMCP+ session.
    pub(crate) fn frame_sol(&mut self, packet: &SolPacket) -> Result<Vec<u8>> {
        if !self.session.as_ref().is_some_and(Session::is_rmcp_plus) {
            return Err(Error::NotSupported("SOL requires an RMCP+ session"));
        }
        self.frame(payload_type::SOL, packet.pack())
    }
}
