use crate::error::{Error, Result};
use crate::types::{
    ActivatedSession, AuthType, ChannelAuthCapabilities, DeviceId, PayloadActivation,
    PrivilegeLevel, RawResponse, SessionChallenge,
};

const NETFN_APP: u8 = 0x06;

/// A typed IPMI command (single request/response).
pub trait Command {
    /// Parsed output type.
    type Output;

    /// Network Function (NetFn) for the request.
    const NETFN: u8;

    /// Command number.
    const CMD: u8;

    /// Encode request payload bytes (excluding NetFn/Cmd framing).
    fn request_data(&self) -> Vec<u8>;

    /// Parse a raw response into the typed output.
    fn parse_response(&self, response: RawResponse) -> Result<Self::Output>;
}

fn ok_data(response: &RawResponse) -> Result<&[u8]> {
    if response.completion_code != 0x00 {
        return Err(Error::CompletionCode {
            completion_code: response.completion_code,
        });
    }
    Ok(&response.data)
}

fn le_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn le_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

/// `Get Device ID` (App NetFn, cmd 0x01).
///
/// Also used as the v1.5 session keep-alive probe.
#[derive(Debug, Clone, Copy)]
pub struct GetDeviceId;

impl Command for GetDeviceId {
    type Output = DeviceId;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = 0x01;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        parse_device_id(ok_data(&response)?)
    }
}

/// `Get Channel Authentication Capabilities` (App NetFn, cmd 0x38).
#[derive(Debug, Clone, Copy)]
pub struct GetChannelAuthCapabilities {
    /// Channel number (low nibble); 0x0E addresses the channel the request arrives on.
    pub channel: u8,
    /// Privilege to query.
    pub privilege: PrivilegeLevel,
    /// Request that IPMI v2.0 data be included when available.
    pub request_v2_data: bool,
}

impl GetChannelAuthCapabilities {
    /// The channel this request is received on.
    pub const CURRENT_CHANNEL: u8 = 0x0E;

    /// Create a query that requests IPMI v2.0 data (when supported).
    pub fn new(channel: u8, privilege: PrivilegeLevel) -> Self {
        Self {
            channel,
            privilege,
            request_v2_data: true,
        }
    }

    /// Return a variant that does not request IPMI v2.0 data.
    pub fn without_v2_data(self) -> Self {
        Self {
            request_v2_data: false,
            ..self
        }
    }
}

impl Command for GetChannelAuthCapabilities {
    type Output = ChannelAuthCapabilities;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = 0x38;

    fn request_data(&self) -> Vec<u8> {
        let channel = if self.request_v2_data {
            (self.channel & 0x0F) | 0x80
        } else {
            self.channel & 0x0F
        };
        vec![channel, self.privilege.as_u8() & 0x0F]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        parse_channel_auth_capabilities(ok_data(&response)?)
    }
}

/// `Get Session Challenge` (App NetFn, cmd 0x39).
#[derive(Debug, Clone, Copy)]
pub struct GetSessionChallenge {
    /// Authentication type the session will use.
    pub auth_type: AuthType,
    /// User name, zero-padded to 16 bytes.
    pub username: [u8; 16],
}

impl Command for GetSessionChallenge {
    type Output = SessionChallenge;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = 0x39;

    fn request_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(17);
        data.push(self.auth_type.as_u8());
        data.extend_from_slice(&self.username);
        data
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        if data.len() < 20 {
            return Err(Error::Decoding("Get Session Challenge response too short"));
        }
        let mut challenge = [0u8; 16];
        challenge.copy_from_slice(&data[4..20]);
        Ok(SessionChallenge {
            temporary_session_id: le_u32(data, 0),
            challenge,
        })
    }
}

/// `Activate Session` (App NetFn, cmd 0x3A).
#[derive(Debug, Clone, Copy)]
pub struct ActivateSession {
    /// Authentication type for the session.
    pub auth_type: AuthType,
    /// Maximum privilege level requested.
    pub privilege: PrivilegeLevel,
    /// Challenge string returned by `Get Session Challenge`.
    pub challenge: [u8; 16],
    /// First sequence number the console will accept from the BMC.
    pub initial_outbound_sequence: u32,
}

impl Command for ActivateSession {
    type Output = ActivatedSession;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = 0x3A;

    fn request_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(22);
        data.push(self.auth_type.as_u8());
        data.push(self.privilege.as_u8());
        data.extend_from_slice(&self.challenge);
        data.extend_from_slice(&self.initial_outbound_sequence.to_le_bytes());
        data
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        if data.len() < 10 {
            return Err(Error::Decoding("Activate Session response too short"));
        }
        Ok(ActivatedSession {
            auth_type: data[0] & 0x0F,
            session_id: le_u32(data, 1),
            initial_inbound_sequence: le_u32(data, 5),
            max_privilege: data[9] & 0x0F,
        })
    }
}

/// `Set Session Privilege Level` (App NetFn, cmd 0x3B).
#[derive(Debug, Clone, Copy)]
pub struct SetSessionPrivilegeLevel {
    /// Requested privilege level.
    pub privilege: PrivilegeLevel,
}

impl Command for SetSessionPrivilegeLevel {
    /// New privilege level granted by the BMC.
    type Output = u8;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = 0x3B;

    fn request_data(&self) -> Vec<u8> {
        vec![self.privilege.as_u8()]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        ok_data(&response)?
            .first()
            .map(|p| p & 0x0F)
            .ok_or(Error::Decoding("Set Session Privilege Level response too short"))
    }
}

/// `Close Session` (App NetFn, cmd 0x3C).
#[derive(Debug, Clone, Copy)]
pub struct CloseSession {
    /// Session to close.
    pub session_id: u32,
}

impl CloseSession {
    /// Completion code for an unknown session ID.
    pub const INVALID_SESSION_ID: u8 = 0x87;
}

impl Command for CloseSession {
    type Output = ();
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = 0x3C;

    fn request_data(&self) -> Vec<u8> {
        self.session_id.to_le_bytes().to_vec()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let _ = ok_data(&response)?;
        Ok(())
    }
}

/// `Activate Payload` (App NetFn, cmd 0x48).
#[derive(Debug, Clone, Copy)]
pub struct ActivatePayload {
    /// Payload type (0x01 = SOL).
    pub payload_type: u8,
    /// Payload instance.
    pub instance: u8,
    /// Request encryption of the payload.
    pub encrypted: bool,
    /// Request authentication of the payload.
    pub authenticated: bool,
}

impl ActivatePayload {
    /// Serial-over-LAN, instance 1.
    pub fn sol(encrypted: bool, authenticated: bool) -> Self {
        Self {
            payload_type: crate::protocol::payload_type::SOL,
            instance: 1,
            encrypted,
            authenticated,
        }
    }
}

impl Command for ActivatePayload {
    type Output = PayloadActivation;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = 0x48;

    fn request_data(&self) -> Vec<u8> {
        let mut aux = 0u8;
        if self.encrypted {
            aux |= 0x80;
        }
        if self.authenticated {
            aux |= 0x40;
        }
        vec![self.payload_type, self.instance & 0x0F, aux, 0, 0, 0]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        if data.len() < 10 {
            return Err(Error::Decoding("Activate Payload response too short"));
        }
        Ok(PayloadActivation {
            inbound_payload_size: le_u16(data, 4),
            outbound_payload_size: le_u16(data, 6),
            port: le_u16(data, 8),
        })
    }
}

/// `Deactivate Payload` (App NetFn, cmd 0x49).
#[derive(Debug, Clone, Copy)]
pub struct DeactivatePayload {
    /// Payload type (0x01 = SOL).
    pub payload_type: u8,
    /// Payload instance.
    pub instance: u8,
}

impl DeactivatePayload {
    /// Deactivate SOL instance 1.
    pub fn sol() -> Self {
        Self {
            payload_type: crate::protocol::payload_type::SOL,
            instance: 1,
        }
    }
}

impl Command for DeactivatePayload {
    type Output = ();
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = 0x49;

    fn request_data(&self) -> Vec<u8> {
        vec![self.payload_type, self.instance & 0x0F, 0, 0, 0, 0]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let _ = ok_data(&response)?;
        Ok(())
    }
}

pub(crate) fn parse_device_id(data: &[u8]) -> Result<DeviceId> {
    if data.len() < 11 {
        return Err(Error::Decoding("Get Device ID response too short"));
    }

    Ok(DeviceId {
        device_id: data[0],
        device_revision: data[1] & 0x0F,
        firmware_major: data[2] & 0x7F,
        firmware_minor: data[3],
        ipmi_version: data[4],
        manufacturer_id: u32::from(data[6])
            | (u32::from(data[7]) << 8)
            | (u32::from(data[8] & 0x0F) << 16),
        product_id: le_u16(data, 9),
    })
}

pub(crate) fn parse_channel_auth_capabilities(data: &[u8]) -> Result<ChannelAuthCapabilities> {
    if data.len() < 8 {
        return Err(Error::Decoding(
            "Get Channel Authentication Capabilities response too short",
        ));
    }

    let enabled_auth_types = data[1] & 0x3F;
    let has_oem = enabled_auth_types & 0x20 != 0;
    let (oem_id, oem_aux_data) = if has_oem {
        let id = u32::from(data[4]) | (u32::from(data[5]) << 8) | (u32::from(data[6]) << 16);
        (Some(id), Some(data[7]))
    } else {
        (None, None)
    };

    Ok(ChannelAuthCapabilities {
        channel_number: data[0] & 0x0F,
        v20_data_available: data[1] & 0x80 != 0,
        enabled_auth_types,
        per_message_auth_disabled: data[2] & 0x10 != 0,
        user_level_auth_disabled: data[2] & 0x08 != 0,
        non_null_usernames: data[2] & 0x04 != 0,
        null_usernames: data[2] & 0x02 != 0,
        anonymous_login_enabled: data[2] & 0x01 != 0,
        kg_nonzero: data[2] & 0x20 != 0,
        supports_ipmi_v1_5: data[3] & 0x01 != 0,
        supports_ipmi_v2_0: data[3] & 0x02 != 0,
        oem_id,
        oem_aux_data,
    })
}
