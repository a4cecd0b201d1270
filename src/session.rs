use crate::crypto::{SecretBytes, SessionKeys};
use crate::error::{Error, Result};
use crate::protocol::algorithm;
use crate::types::AuthType;

const MAX_CREDENTIAL_LEN: usize = 16;
const MAX_BMC_KEY_LEN: usize = 20;

/// Per-session state: identifiers, sequence bookkeeping, credentials and keys.
///
/// A `Session` is created empty by the caller, filled in with credentials and
/// then handed to [`crate::Client::establish_session`], which populates the
/// remaining fields during the handshake. It is cleared again on close.
#[derive(Debug, Default)]
pub struct Session {
    session_id: u32,
    sequence_number: u32,
    auth_type: Option<AuthType>,
    activated: bool,
    username: Vec<u8>,
    password: SecretBytes,
    bmc_key: Option<SecretBytes>,
    integrity_algorithm: u8,
    confidentiality_algorithm: u8,
    keys: Option<SessionKeys>,
}

impl Session {
    /// An empty, unauthenticated session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user name and password (each at most 16 bytes).
    pub fn set_credentials(
        &mut self,
        username: impl AsRef<[u8]>,
        password: impl AsRef<[u8]>,
    ) -> Result<()> {
        let username = username.as_ref();
        let password = password.as_ref();
        if username.len() > MAX_CREDENTIAL_LEN {
            return Err(Error::InvalidArgument("username exceeds 16 bytes"));
        }
        if password.len() > MAX_CREDENTIAL_LEN {
            return Err(Error::InvalidArgument("password exceeds 16 bytes"));
        }
        self.username = username.to_vec();
        self.password = SecretBytes::new(password.to_vec());
        Ok(())
    }

    /// Set the BMC key (Kg) used to derive the session integrity key.
    ///
    /// Without one, the user password doubles as Kg.
    pub fn set_bmc_key(&mut self, bmc_key: impl AsRef<[u8]>) -> Result<()> {
        let bmc_key = bmc_key.as_ref();
        if bmc_key.len() > MAX_BMC_KEY_LEN {
            return Err(Error::InvalidArgument("BMC key exceeds 20 bytes"));
        }
        self.bmc_key = Some(SecretBytes::new(bmc_key.to_vec()));
        Ok(())
    }

    /// Session ID assigned by the managed system (0 before establishment).
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Sequence number of the last authenticated packet sent.
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Authentication type in use, once negotiated.
    pub fn auth_type(&self) -> Option<AuthType> {
        self.auth_type
    }

    /// Whether the session has been activated by the managed system.
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Whether outbound payloads are encrypted (RMCP+ with AES-CBC-128).
    pub fn is_encrypted(&self) -> bool {
        self.keys.is_some()
            && self.confidentiality_algorithm == algorithm::CONFIDENTIALITY_AES_CBC_128
    }

    /// Whether outbound packets carry an HMAC-SHA1-96 trailer.
    pub fn is_authenticated(&self) -> bool {
        self.keys.is_some() && self.integrity_algorithm == algorithm::INTEGRITY_HMAC_SHA1_96
    }

    /// Whether the session uses the IPMI v2.0 (RMCP+) packet format.
    pub fn is_rmcp_plus(&self) -> bool {
        self.auth_type == Some(AuthType::RmcpPlus)
    }

    pub(crate) fn username(&self) -> &[u8] {
        &self.username
    }

    pub(crate) fn password(&self) -> &SecretBytes {
        &self.password
    }

    pub(crate) fn bmc_key(&self) -> Option<&SecretBytes> {
        self.bmc_key.as_ref()
    }

    pub(crate) fn keys(&self) -> Option<&SessionKeys> {
        self.keys.as_ref()
    }

    /// Username zero-padded to 16 bytes, as carried by v1.5 session commands.
    pub(crate) fn username_padded(&self) -> [u8; 16] {
        crate::crypto::normalize_key::<16>(&self.username)
    }

    /// The sequence number the next outbound packet carries.
    ///
    /// Pre-activation packets reuse the current value; activated sessions
    /// advance by one, wrapping from `u32::MAX` to 1.
    pub(crate) fn next_sequence_number(&self) -> u32 {
        if !self.activated {
            return self.sequence_number;
        }
        match self.sequence_number {
            u32::MAX => 1,
            n => n + 1,
        }
    }

    /// Commit the sequence number returned by [`Self::next_sequence_number`]
    /// once the packet carrying it was sent.
    pub(crate) fn increment_sequence_number(&mut self) -> u32 {
        self.sequence_number = self.next_sequence_number();
        self.sequence_number
    }

    /// Start a v1.5 exchange under `auth_type` with a temporary session ID.
    pub(crate) fn begin(&mut self, auth_type: AuthType, session_id: u32) {
        self.auth_type = Some(auth_type);
        self.session_id = session_id;
        self.sequence_number = 0;
        self.activated = false;
    }

    /// Mark a v1.5 session active with the IDs returned by `Activate Session`.
    pub(crate) fn activate(&mut self, auth_type: AuthType, session_id: u32, sequence: u32) {
        self.auth_type = Some(auth_type);
        self.session_id = session_id;
        self.sequence_number = sequence;
        self.activated = true;
    }

    /// Install RMCP+ key material derived from the session integrity key.
    ///
    /// Sequence numbering restarts so the first protected packet carries 1.
    pub(crate) fn install_keys(&mut self, managed_session_id: u32, sik: &[u8; 20]) -> Result<()> {
        self.keys = Some(SessionKeys::derive(sik)?);
        self.auth_type = Some(AuthType::RmcpPlus);
        self.integrity_algorithm = algorithm::INTEGRITY_HMAC_SHA1_96;
        self.confidentiality_algorithm = algorithm::CONFIDENTIALITY_AES_CBC_128;
        self.session_id = managed_session_id;
        self.sequence_number = 0;
        self.activated = true;
        Ok(())
    }

    /// Forget identifiers and keys; credentials are kept for re-establishment.
    pub(crate) fn clear(&mut self) {
        self.session_id = 0;
        self.sequence_number = 0;
        self.auth_type = None;
        self.activated = false;
        self.integrity_algorithm = algorithm::INTEGRITY_NONE;
        self.confidentiality_algorithm = algorithm::CONFIDENTIALITY_NONE;
        self.keys = None;
    }
}
