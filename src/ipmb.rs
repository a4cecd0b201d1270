//! IPMB message framing and Send Message bridging.
//!
//! Layout of a request on the wire (IPMI v2.0 section 5.2):
//!
//! ```text
//! rsSA | netFn/rsLUN | chk1 | rqSA | rqSeq/rqLUN | cmd | data... | chk2
//! ```
//!
//! Responses swap the address roles: `rqSA | netFn/rqLUN | chk1 | rsSA |
//! rqSeq/rsLUN | cmd | cc | data... | chk2`.

use crate::error::{Error, Result};
use crate::types::{RawResponse, Routing};

/// IPMB slave address of the BMC.
pub(crate) const BMC_SLAVE_ADDR: u8 = 0x20;
/// Software ID used by remote consoles.
pub(crate) const REMOTE_SWID: u8 = 0x81;

const NETFN_APP: u8 = 0x06;
const CMD_SEND_MESSAGE: u8 = 0x34;
const SEND_MESSAGE_TRACKING: u8 = 1 << 6;
const HEADER_LEN: usize = 6;

/// Two's complement checksum: the byte that makes the sum of `data` plus
/// itself zero modulo 256.
pub(crate) fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    sum.wrapping_neg()
}

/// Request-direction IPMB header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IpmbHeader {
    pub(crate) rs_sa: u8,
    pub(crate) netfn: u8,
    pub(crate) rs_lun: u8,
    pub(crate) rq_sa: u8,
    pub(crate) rq_seq: u8,
    pub(crate) rq_lun: u8,
    pub(crate) cmd_id: u8,
}

impl IpmbHeader {
    pub(crate) fn encode(&self) -> [u8; HEADER_LEN] {
        let netfn_lun = (self.netfn << 2) | (self.rs_lun & 0x03);
        [
            self.rs_sa,
            netfn_lun,
            checksum(&[self.rs_sa, netfn_lun]),
            self.rq_sa,
            ((self.rq_seq & 0x3F) << 2) | (self.rq_lun & 0x03),
            self.cmd_id,
        ]
    }

    #[cfg(test)]
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::Decoding("IPMB header too short"));
        }
        if checksum(&data[..3]) != 0 {
            return Err(Error::Decoding("IPMB header checksum mismatch"));
        }
        Ok(Self {
            rs_sa: data[0],
            netfn: data[1] >> 2,
            rs_lun: data[1] & 0x03,
            rq_sa: data[3],
            rq_seq: data[4] >> 2,
            rq_lun: data[4] & 0x03,
            cmd_id: data[5],
        })
    }
}

/// Header, data and trailing checksum over everything after the first checksum.
pub(crate) fn encode_ipmb_msg(header: &IpmbHeader, data: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(HEADER_LEN + data.len() + 1);
    msg.extend_from_slice(&header.encode());
    msg.extend_from_slice(data);
    msg.push(checksum(&msg[3..]));
    msg
}

/// Wrap `payload` in a tracked Send Message request addressed to `rs_sa`.
pub(crate) fn encode_send_message(
    payload: &[u8],
    rq_sa: u8,
    rs_sa: u8,
    channel: u8,
    seq: u8,
) -> Vec<u8> {
    let header = IpmbHeader {
        rs_sa,
        netfn: NETFN_APP,
        rs_lun: 0,
        rq_sa,
        rq_seq: seq,
        rq_lun: 0,
        cmd_id: CMD_SEND_MESSAGE,
    };
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(SEND_MESSAGE_TRACKING | (channel & 0x0F));
    data.extend_from_slice(payload);
    encode_ipmb_msg(&header, &data)
}

/// Encode `data` for the target at the end of `routing`.
///
/// The last hop supplies the addresses of the inner request; every earlier
/// hop wraps the message once more in Send Message, innermost first.
pub(crate) fn encode_bridged_message(
    routing: &[Routing],
    header: &IpmbHeader,
    data: &[u8],
    seq: u8,
) -> Result<Vec<u8>> {
    let (last, bridges) = routing
        .split_last()
        .ok_or(Error::InvalidArgument("bridged message needs a routing path"))?;

    let inner = IpmbHeader {
        rq_sa: last.rq_sa,
        rs_sa: last.rs_sa,
        ..*header
    };
    let mut tx = encode_ipmb_msg(&inner, data);
    for hop in bridges.iter().rev() {
        tx = encode_send_message(&tx, hop.rq_sa, hop.rs_sa, hop.channel, seq);
    }
    Ok(tx)
}

/// Strip Send Message response layers.
///
/// An empty result means the bridge only acknowledged the request; the
/// target's reply arrives in a later datagram.
pub(crate) fn decode_bridged_message(rx: &[u8]) -> Result<Vec<u8>> {
    let mut data = rx;
    while data.len() >= HEADER_LEN && data[5] == CMD_SEND_MESSAGE {
        let completion_code = *data
            .get(6)
            .ok_or(Error::Decoding("Send Message response has no completion code"))?;
        if completion_code != 0 {
            return Err(Error::CompletionCode { completion_code });
        }
        data = data.get(7..data.len().saturating_sub(1)).unwrap_or(&[]);
        if data.len() < HEADER_LEN {
            break;
        }
    }
    Ok(data.to_vec())
}

/// Whether `rx` is the reply to the request described by `header`.
pub(crate) fn rx_filter(header: &IpmbHeader, rx: &[u8]) -> bool {
    if rx.len() <= HEADER_LEN {
        return false;
    }
    let checks = [
        (checksum(&rx[..3]) == 0, "header checksum"),
        (checksum(&rx[3..]) == 0, "payload checksum"),
        (rx[1] >> 2 == header.netfn | 1, "netfn"),
        (rx[4] & 0x03 == header.rs_lun, "responder LUN"),
        (rx[4] >> 2 == header.rq_seq, "sequence number"),
        (rx[5] == header.cmd_id, "command id"),
    ];
    match checks.iter().find(|(ok, _)| !ok) {
        Some((_, what)) => {
            crate::observe::rx_mismatch(what);
            false
        }
        None => true,
    }
}

/// Check both IPMB checksums of a received message.
pub(crate) fn verify_checksums(rx: &[u8]) -> Result<()> {
    if rx.len() <= HEADER_LEN {
        return Err(Error::Decoding("IPMB message too short"));
    }
    if checksum(&rx[..3]) != 0 {
        return Err(Error::Decoding("IPMB header checksum mismatch"));
    }
    if checksum(&rx[3..]) != 0 {
        return Err(Error::Decoding("IPMB payload checksum mismatch"));
    }
    Ok(())
}

/// Completion code and data of a response that passed [`rx_filter`].
pub(crate) fn response_body(rx: &[u8]) -> Result<RawResponse> {
    if rx.len() < HEADER_LEN + 2 {
        return Err(Error::Decoding("IPMB response too short"));
    }
    RawResponse::from_body(&rx[HEADER_LEN..rx.len() - 1])
}

/// Encode the reply a responder would send for `request`.
#[cfg(test)]
pub(crate) fn encode_response(request: &IpmbHeader, body: &[u8]) -> Vec<u8> {
    let netfn_lun = ((request.netfn | 1) << 2) | (request.rq_lun & 0x03);
    let mut msg = vec![
        request.rq_sa,
        netfn_lun,
        checksum(&[request.rq_sa, netfn_lun]),
        request.rs_sa,
        ((request.rq_seq & 0x3F) << 2) | (request.rs_lun & 0x03),
        request.cmd_id,
    ];
    msg.extend_from_slice(body);
    msg.push(checksum(&msg[3..]));
    msg
}
