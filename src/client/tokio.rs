use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard};

use crate::client::ClientBuilder;
use crate::client::core::ClientCore;
use crate::commands::{CloseSession, Command, GetChannelAuthCapabilities};
use crate::error::{Error, Result};
use crate::handshake::{Nonces, RakpHandshake, Step};
use crate::protocol::payload_type;
use crate::session::Session;
use crate::transport::AsyncTransport;
use crate::transport::tokio::UdpTransport;
use crate::types::{ChannelAuthCapabilities, PrivilegeLevel, RawResponse, Target};

/// An async IPMI-over-LAN client on tokio.
///
/// Supports RMCP+ sessions only; IPMI v1.5 controllers need the blocking
/// [`Client`](crate::Client), which also runs the keep-alive they require.
pub struct AsyncClient {
    transport: Box<dyn AsyncTransport + Send + Sync>,
    core: Mutex<ClientCore>,
    timeout: Duration,
    privilege_level: PrivilegeLevel,
    bmc_target: Target,
}

impl ClientBuilder {
    /// Open a tokio UDP socket and build the [`AsyncClient`].
    pub async fn build_async(self) -> Result<AsyncClient> {
        let transport =
            UdpTransport::connect(self.target, self.timeout, self.max_packet_size).await?;
        Ok(self.build_with_async_transport(Box::new(transport)))
    }

    /// Build an [`AsyncClient`] over a caller-supplied transport.
    pub fn build_with_async_transport(
        self,
        transport: Box<dyn AsyncTransport + Send + Sync>,
    ) -> AsyncClient {
        let core = ClientCore::new(self.core_config());
        let bmc_target = core.bmc_target();
        AsyncClient {
            transport,
            core: Mutex::new(core),
            timeout: self.timeout,
            privilege_level: self.privilege_level,
            bmc_target,
        }
    }
}

impl AsyncClient {
    /// Send an ASF Presence Ping and wait for the matching pong.
    pub async fn ping(&self) -> Result<()> {
        let mut core = self.core.lock().await;
        let (tag, datagram) = core.ping_request();
        self.transport.send(&datagram).await?;
        let reply = self.transport.recv().await?;
        let pong = core.parse_pong(tag, &reply)?;
        crate::observe::pong(pong.supports_ipmi());
        Ok(())
    }

    /// Whether an RMCP+ session is currently activated.
    pub async fn session_active(&self) -> bool {
        self.core.lock().await.is_session_active()
    }

    /// Establish an RMCP+ session using the credentials held by `session`.
    ///
    /// Fails with [`Error::NotSupported`] when the BMC does not advertise IPMI v2.0.
    pub async fn establish_session(&self, mut session: Session) -> Result<()> {
        self.core.lock().await.set_session(None);
        self.ping().await?;

        let caps = self.channel_auth_capabilities().await?;
        if !caps.ipmi_2_0() {
            return Err(Error::NotSupported(
                "the async client only opens IPMI v2.0 (RMCP+) sessions",
            ));
        }

        let mut core = self.core.lock().await;
        let mut handshake = RakpHandshake::new(
            session.username(),
            session.password(),
            session.bmc_key(),
            self.privilege_level,
            Nonces::random(),
        );
        let mut outbound = handshake.start()?;
        let established = loop {
            let datagram = core.frame(outbound.payload_type, outbound.payload)?;
            self.transport.send(&datagram).await?;
            let reply = self.transport.recv().await?;
            let (received_type, payload) = core.unwrap(&reply)?;
            match handshake.step(received_type, &payload)? {
                Step::Send(next) => outbound = next,
                Step::Established(established) => break established,
            }
        };

        session.install_keys(established.managed_session_id, &established.sik)?;
        crate::observe::session_established("rmcp+", session.session_id());
        core.set_session(Some(session));
        Ok(())
    }

    /// Close the session; a no-op without one.
    ///
    /// A timeout or completion code 0x87 still leaves the client closed.
    pub async fn close_session(&self) -> Result<()> {
        let mut core = self.core.lock().await;
        let Some(session_id) = core
            .session()
            .filter(|session| session.is_activated())
            .map(Session::session_id)
        else {
            return Ok(());
        };

        let command = CloseSession { session_id };
        let result = self
            .transact(
                &mut core,
                &self.bmc_target,
                0,
                CloseSession::NETFN,
                CloseSession::CMD,
                &command.request_data(),
            )
            .await
            .and_then(|rsp| command.parse_response(rsp));
        if let Some(session) = core.session_mut() {
            session.clear();
        }
        crate::observe::session_closed(session_id);

        match result {
            Ok(()) | Err(Error::Timeout) => Ok(()),
            Err(Error::CompletionCode { completion_code })
                if completion_code == CloseSession::INVALID_SESSION_ID =>
            {
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Execute a typed command addressed to the BMC.
    pub async fn execute<C: Command>(&self, command: C) -> Result<C::Output> {
        let mut core = self.core.lock().await;
        let rsp = self
            .transact(
                &mut core,
                &self.bmc_target,
                0,
                C::NETFN,
                C::CMD,
                &command.request_data(),
            )
            .await?;
        command.parse_response(rsp)
    }

    /// Send `raw` (command byte followed by request data) to `target`.
    pub async fn send_and_receive_raw(
        &self,
        target: &Target,
        lun: u8,
        netfn: u8,
        raw: &[u8],
    ) -> Result<RawResponse> {
        let (&cmd, data) = raw
            .split_first()
            .ok_or(Error::InvalidArgument("raw request needs a command byte"))?;
        let mut core = self.core.lock().await;
        self.transact(&mut core, target, lun, netfn, cmd, data).await
    }

    async fn channel_auth_capabilities(&self) -> Result<ChannelAuthCapabilities> {
        let cmd = GetChannelAuthCapabilities::new(
            GetChannelAuthCapabilities::CURRENT_CHANNEL,
            self.privilege_level,
        );
        match self.execute(cmd).await {
            Ok(caps) => Ok(caps),
            Err(Error::CompletionCode { .. }) => self.execute(cmd.without_v2_data()).await,
            Err(e) => Err(e),
        }
    }

    async fn transact(
        &self,
        core: &mut MutexGuard<'_, ClientCore>,
        target: &Target,
        lun: u8,
        netfn: u8,
        cmd: u8,
        data: &[u8],
    ) -> Result<RawResponse> {
        let start = Instant::now();
        let result = self.transact_inner(core, target, lun, netfn, cmd, data, start).await;
        let elapsed = start.elapsed();
        match &result {
            Ok(rsp) => crate::observe::record_ok("async", netfn, cmd, elapsed, rsp.completion_code),
            Err(err) => crate::observe::record_err("async", netfn, cmd, elapsed, err),
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn transact_inner(
        &self,
        core: &mut MutexGuard<'_, ClientCore>,
        target: &Target,
        lun: u8,
        netfn: u8,
        cmd: u8,
        data: &[u8],
        start: Instant,
    ) -> Result<RawResponse> {
        let (header, msg) = core.build_request(target, lun, netfn, cmd, data)?;
        let datagram = core.frame(payload_type::IPMI, msg)?;
        self.transport.send(&datagram).await?;
        core.commit_sent();

        if let Some(rsp) = core.take_pending(&header)? {
            return Ok(rsp);
        }
        loop {
            if start.elapsed() > self.timeout {
                return Err(Error::Timeout);
            }
            let datagram = self.transport.recv().await?;
            if let Some(rsp) = core.accept(&header, &datagram)? {
                return Ok(rsp);
            }
        }
    }
}

impl std::fmt::Debug for AsyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncClient")
            .field("bmc_target", &self.bmc_target)
            .field("privilege_level", &self.privilege_level)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
