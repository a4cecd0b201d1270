use core::fmt;

/// The privilege level requested for the IPMI session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrivilegeLevel {
    /// Callback privilege.
    Callback = 0x01,
    /// User privilege.
    User = 0x02,
    /// Operator privilege.
    Operator = 0x03,
    /// Administrator privilege.
    Administrator = 0x04,
    /// OEM-defined privilege.
    Oem = 0x05,
}

impl PrivilegeLevel {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Session authentication type (IPMI v1.5 header byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthType {
    /// No per-packet authentication.
    None = 0x00,
    /// MD2 (recognized, not supported).
    Md2 = 0x01,
    /// MD5 auth code.
    Md5 = 0x02,
    /// Straight (clear-text) password.
    Password = 0x04,
    /// OEM proprietary (recognized, not supported).
    Oem = 0x05,
    /// RMCP+ (IPMI v2.0) session format.
    RmcpPlus = 0x06,
}

impl AuthType {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value & 0x0F {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Md2),
            0x02 => Some(Self::Md5),
            0x04 => Some(Self::Password),
            0x05 => Some(Self::Oem),
            0x06 => Some(Self::RmcpPlus),
            _ => None,
        }
    }
}

/// RMCP+ payload carried by [`crate::Client::send_and_receive_rmcp2`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    /// Standard IPMI message.
    Ipmi,
    /// Serial-over-LAN character data.
    Sol,
}

impl PayloadType {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Ipmi => crate::protocol::payload_type::IPMI,
            Self::Sol => crate::protocol::payload_type::SOL,
        }
    }
}

/// A raw IPMI response.
#[derive(Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// IPMI completion code.
    pub completion_code: u8,
    /// Payload bytes after the completion code.
    pub data: Vec<u8>,
}

impl RawResponse {
    /// Split `completion code || data` as carried in an IPMB response body.
    pub(crate) fn from_body(body: &[u8]) -> crate::error::Result<Self> {
        let (&completion_code, data) = body
            .split_first()
            .ok_or(crate::error::Error::Decoding("response has no completion code"))?;
        Ok(Self {
            completion_code,
            data: data.to_vec(),
        })
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field(
                "completion_code",
                &format_args!("{:#04x}", self.completion_code),
            )
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// One hop of an IPMB bridge path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    /// Requester slave address used on this hop.
    pub rq_sa: u8,
    /// Responder slave address on this hop.
    pub rs_sa: u8,
    /// Channel the message is forwarded on.
    pub channel: u8,
}

impl Routing {
    /// Create a hop.
    pub fn new(rq_sa: u8, rs_sa: u8, channel: u8) -> Self {
        Self {
            rq_sa,
            rs_sa,
            channel,
        }
    }
}

/// An addressable controller, optionally reached through bridges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// IPMB slave address of the controller.
    pub ipmb_address: u8,
    /// Bridge path; the last hop addresses the controller itself.
    pub routing: Vec<Routing>,
}

impl Target {
    /// A controller reached without bridging.
    pub fn new(ipmb_address: u8) -> Self {
        Self {
            ipmb_address,
            routing: Vec::new(),
        }
    }

    /// A controller reached through `routing`.
    pub fn with_routing(ipmb_address: u8, routing: Vec<Routing>) -> Self {
        Self {
            ipmb_address,
            routing,
        }
    }

    pub(crate) fn is_bridged(&self) -> bool {
        !self.routing.is_empty()
    }
}

/// Parsed response for the `Get Device ID` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId {
    /// Device ID (BMC-defined).
    pub device_id: u8,
    /// Device revision (lower 4 bits are the revision).
    pub device_revision: u8,
    /// Firmware major revision.
    pub firmware_major: u8,
    /// Firmware minor revision.
    pub firmware_minor: u8,
    /// IPMI version as BCD (e.g. 0x02 for 2.0).
    pub ipmi_version: u8,
    /// Manufacturer ID (24-bit, least-significant byte first).
    pub manufacturer_id: u32,
    /// Product ID.
    pub product_id: u16,
}

/// Parsed response for `Get Session Challenge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChallenge {
    /// Temporary session ID to use until activation.
    pub temporary_session_id: u32,
    /// Challenge string to echo in `Activate Session`.
    pub challenge: [u8; 16],
}

/// Parsed response for `Activate Session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedSession {
    /// Authentication type for the remainder of the session.
    pub auth_type: u8,
    /// Session ID assigned by the BMC.
    pub session_id: u32,
    /// Initial inbound sequence number.
    pub initial_inbound_sequence: u32,
    /// Maximum privilege allowed for this session.
    pub max_privilege: u8,
}

/// Parsed response for `Activate Payload` (SOL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadActivation {
    /// Maximum inbound payload size accepted by the BMC.
    pub inbound_payload_size: u16,
    /// Maximum outbound payload size the BMC will send.
    pub outbound_payload_size: u16,
    /// UDP port for the payload.
    pub port: u16,
}

/// Parsed response for `Get Channel Authentication Capabilities`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAuthCapabilities {
    /// Channel number.
    pub channel_number: u8,
    /// Indicates IPMI v2.0 data is available in the response.
    pub v20_data_available: bool,
    /// IPMI v1.5 enabled authentication types (bitmask).
    pub enabled_auth_types: u8,
    /// Per-message authentication is disabled when true.
    pub per_message_auth_disabled: bool,
    /// User-level authentication is disabled when true.
    pub user_level_auth_disabled: bool,
    /// One or more non-null user names exist.
    pub non_null_usernames: bool,
    /// One or more null user names with non-null passwords exist.
    pub null_usernames: bool,
    /// Anonymous login (null user/null password) is enabled.
    pub anonymous_login_enabled: bool,
    /// Non-zero Kg key is configured (two-key login).
    pub kg_nonzero: bool,
    /// Channel supports IPMI v1.5 (extended capabilities bit).
    pub supports_ipmi_v1_5: bool,
    /// Channel supports IPMI v2.0 (extended capabilities bit).
    pub supports_ipmi_v2_0: bool,
    /// OEM IANA enterprise number for OEM auth types, if present.
    pub oem_id: Option<u32>,
    /// OEM auxiliary data for OEM auth types, if present.
    pub oem_aux_data: Option<u8>,
}

impl ChannelAuthCapabilities {
    const AUTH_NONE: u8 = 0x01;
    const AUTH_MD5: u8 = 0x04;
    const AUTH_PASSWORD: u8 = 0x10;

    /// Whether an IPMI v2.0 (RMCP+) session can be opened.
    pub fn ipmi_2_0(&self) -> bool {
        self.v20_data_available && self.supports_ipmi_v2_0
    }

    /// Whether an IPMI v1.5 session can be opened.
    ///
    /// Pre-2.0 controllers leave the extended capabilities byte zero, so the
    /// absence of v2.0 data implies v1.5.
    pub fn ipmi_1_5(&self) -> bool {
        !self.v20_data_available || self.supports_ipmi_v1_5
    }

    /// Strongest v1.5 authentication type this crate can use on the channel.
    ///
    /// MD5 is preferred over straight password, which is preferred over none.
    /// MD2 and OEM types are not considered.
    pub fn max_auth_type(&self) -> Option<AuthType> {
        if self.enabled_auth_types & Self::AUTH_MD5 != 0 {
            Some(AuthType::Md5)
        } else if self.enabled_auth_types & Self::AUTH_PASSWORD != 0 {
            Some(AuthType::Password)
        } else if self.enabled_auth_types & Self::AUTH_NONE != 0 {
            Some(AuthType::None)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(enabled_auth_types: u8, v20: bool, v15_bit: bool, v20_bit: bool) -> ChannelAuthCapabilities {
        ChannelAuthCapabilities {
            channel_number: 1,
            v20_data_available: v20,
            enabled_auth_types,
            per_message_auth_disabled: false,
            user_level_auth_disabled: false,
            non_null_usernames: true,
            null_usernames: false,
            anonymous_login_enabled: false,
            kg_nonzero: false,
            supports_ipmi_v1_5: v15_bit,
            supports_ipmi_v2_0: v20_bit,
            oem_id: None,
            oem_aux_data: None,
        }
    }

    #[test]
    fn max_auth_type_prefers_md5() {
        assert_eq!(caps(0x15, true, true, true).max_auth_type(), Some(AuthType::Md5));
        assert_eq!(caps(0x11, true, true, true).max_auth_type(), Some(AuthType::Password));
        assert_eq!(caps(0x01, true, true, true).max_auth_type(), Some(AuthType::None));
        assert_eq!(caps(0x02, true, true, true).max_auth_type(), None);
    }

    #[test]
    fn version_support_from_extended_capabilities() {
        let legacy = caps(0x04, false, false, false);
        assert!(legacy.ipmi_1_5());
        assert!(!legacy.ipmi_2_0());

        let plus_only = caps(0x00, true, false, true);
        assert!(!plus_only.ipmi_1_5());
        assert!(plus_only.ipmi_2_0());

        let neither = caps(0x00, true, false, false);
        assert!(!neither.ipmi_1_5());
        assert!(!neither.ipmi_2_0());
    }

    #[test]
    fn auth_type_from_u8_masks_reserved_bits() {
        assert_eq!(AuthType::from_u8(0x02), Some(AuthType::Md5));
        assert_eq!(AuthType::from_u8(0x06), Some(AuthType::RmcpPlus));
        assert_eq!(AuthType::from_u8(0x03), None);
    }
}
