use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::RngCore;

use crate::client::ClientBuilder;
use crate::client::core::ClientCore;
use crate::client::keepalive::KeepAlive;
use crate::commands::{
    ActivatePayload, ActivateSession, CloseSession, Command, DeactivatePayload,
    GetChannelAuthCapabilities, GetDeviceId, GetSessionChallenge, SetSessionPrivilegeLevel,
};
use crate::error::{Error, Result};
use crate::handshake::{Nonces, RakpHandshake, Step};
use crate::protocol::payload_type;
use crate::protocol::sol::{SolPacket, SolRelay};
use crate::session::Session;
use crate::transport::Transport;
use crate::transport::blocking::UdpTransport;
use crate::types::{
    AuthType, ChannelAuthCapabilities, DeviceId, PayloadType, PrivilegeLevel, RawResponse, Target,
};

/// A blocking IPMI-over-LAN client.
///
/// Every exchange holds one lock over the socket, the session and the
/// sequence counters, so a `Client` can be shared between threads behind an
/// [`Arc`]. While an IPMI v1.5 session is open a background thread keeps it
/// alive with `Get Device ID`; it stops on [`Client::close_session`] or drop.
pub struct Client {
    inner: Arc<Mutex<Inner>>,
    keep_alive: Mutex<Option<KeepAlive>>,
    keep_alive_interval: Option<Duration>,
    privilege_level: PrivilegeLevel,
    bmc_target: Target,
}

struct Inner {
    transport: Box<dyn Transport + Send>,
    core: ClientCore,
    timeout: Duration,
}

impl ClientBuilder {
    /// Open the UDP socket and build the [`Client`].
    ///
    /// No session is established yet; see [`Client::establish_session`].
    pub fn build(self) -> Result<Client> {
        let transport = UdpTransport::connect(self.target, self.timeout, self.max_packet_size)?;
        Ok(self.build_with_transport(Box::new(transport)))
    }

    /// Build a [`Client`] over a caller-supplied transport.
    pub fn build_with_transport(self, transport: Box<dyn Transport + Send>) -> Client {
        let core = ClientCore::new(self.core_config());
        let bmc_target = core.bmc_target();
        Client {
            inner: Arc::new(Mutex::new(Inner {
                transport,
                core,
                timeout: self.timeout,
            })),
            keep_alive: Mutex::new(None),
            keep_alive_interval: self.keep_alive_interval,
            privilege_level: self.privilege_level,
            bmc_target,
        }
    }
}

impl Client {
    /// Create a [`ClientBuilder`].
    pub fn builder(target: std::net::SocketAddr) -> ClientBuilder {
        ClientBuilder::new(target)
    }

    /// Send an ASF Presence Ping and wait for the matching pong.
    pub fn ping(&self) -> Result<()> {
        let mut inner = self.lock_inner()?;
        let (tag, datagram) = inner.core.ping_request();
        inner.transport.send(&datagram)?;
        let reply = inner.transport.recv()?;
        let pong = inner.core.parse_pong(tag, &reply)?;
        crate::observe::pong(pong.supports_ipmi());
        Ok(())
    }

    /// Change the receive timeout for subsequent exchanges.
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        let mut inner = self.lock_inner()?;
        inner.transport.set_timeout(timeout)?;
        inner.timeout = timeout;
        Ok(())
    }

    /// Whether a session is currently activated.
    pub fn session_active(&self) -> bool {
        self.lock_inner()
            .map(|inner| inner.core.is_session_active())
            .unwrap_or(false)
    }

    /// Establish a session using the credentials held by `session`.
    ///
    /// Pings the BMC and queries its authentication capabilities, then runs
    /// the RMCP+ RAKP handshake when IPMI v2.0 is advertised, or the IPMI v1.5
    /// challenge and activation otherwise. Any session this client had open
    /// is forgotten first.
    pub fn establish_session(&self, session: Session) -> Result<()> {
        self.stop_keep_alive();
        self.lock_inner()?.core.set_session(None);

        self.ping()?;
        let caps = self.get_channel_auth_capabilities(
            GetChannelAuthCapabilities::CURRENT_CHANNEL,
            self.privilege_level,
        )?;

        if caps.ipmi_2_0() {
            self.establish_rmcp_plus(session)
        } else if caps.ipmi_1_5() {
            let auth_type = caps.max_auth_type().ok_or(Error::NotSupported(
                "no supported IPMI v1.5 authentication type is enabled",
            ))?;
            self.establish_v15(session, auth_type)
        } else {
            Err(Error::NotSupported(
                "neither IPMI v2.0 nor IPMI v1.5 is supported by the BMC",
            ))
        }
    }

    fn establish_rmcp_plus(&self, mut session: Session) -> Result<()> {
        let mut inner = self.lock_inner()?;
        let mut handshake = RakpHandshake::new(
            session.username(),
            session.password(),
            session.bmc_key(),
            self.privilege_level,
            Nonces::random(),
        );

        let mut outbound = handshake.start()?;
        let established = loop {
            let (received_type, payload) =
                exchange_rmcp2(&mut inner, outbound.payload_type, outbound.payload)?;
            match handshake.step(received_type, &payload)? {
                Step::Send(next) => outbound = next,
                Step::Established(established) => break established,
            }
        };

        session.install_keys(established.managed_session_id, &established.sik)?;
        crate::observe::session_established("rmcp+", session.session_id());
        inner.core.set_session(Some(session));
        Ok(())
    }

    fn establish_v15(&self, mut session: Session, auth_type: AuthType) -> Result<()> {
        let target = self.bmc_target.clone();
        {
            let mut inner = self.lock_inner()?;
            let challenge = execute_locked(
                &mut inner,
                &target,
                &GetSessionChallenge {
                    auth_type,
                    username: session.username_padded(),
                },
            )?;

            session.begin(auth_type, challenge.temporary_session_id);
            inner.core.set_session(Some(session));

            if let Err(err) = activate_v15(
                &mut inner,
                &target,
                auth_type,
                challenge.challenge,
                self.privilege_level,
            ) {
                inner.core.set_session(None);
                return Err(err);
            }

            let session_id = inner.core.session().map_or(0, Session::session_id);
            crate::observe::session_established("lan", session_id);
        }
        self.start_keep_alive()
    }

    /// Close the session (App NetFn, cmd 0x3C) and stop the keep-alive.
    ///
    /// Closing without an active session is a no-op. A BMC that does not
    /// answer, or that no longer knows the session (completion code 0x87),
    /// still leaves the client closed and returns `Ok`.
    pub fn close_session(&self) -> Result<()> {
        self.stop_keep_alive();

        let mut inner = self.lock_inner()?;
        let Some(session_id) = inner
            .core
            .session()
            .filter(|session| session.is_activated())
            .map(Session::session_id)
        else {
            return Ok(());
        };

        let result = execute_locked(&mut inner, &self.bmc_target, &CloseSession { session_id });
        if let Some(session) = inner.core.session_mut() {
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
    pub fn execute<C: Command>(&self, command: C) -> Result<C::Output> {
        self.send_and_receive(&self.bmc_target, command)
    }

    /// Execute a typed command addressed to `target`, bridging when it has a route.
    pub fn send_and_receive<C: Command>(&self, target: &Target, command: C) -> Result<C::Output> {
        let mut inner = self.lock_inner()?;
        execute_locked(&mut inner, target, &command)
    }

    /// Send `raw` (command byte followed by request data) to `target`.
    ///
    /// Completion codes are returned as-is in the [`RawResponse`].
    pub fn send_and_receive_raw(
        &self,
        target: &Target,
        lun: u8,
        netfn: u8,
        raw: &[u8],
    ) -> Result<RawResponse> {
        let (&cmd, data) = raw
            .split_first()
            .ok_or(Error::InvalidArgument("raw request needs a command byte"))?;
        let mut inner = self.lock_inner()?;
        transact(&mut inner, target, lun, netfn, cmd, data)
    }

    /// Send a command to the BMC inside the active RMCP+ session as `payload`.
    ///
    /// The next datagram is taken as the reply; both IPMB checksums are verified.
    pub fn send_and_receive_rmcp2<C: Command>(
        &self,
        command: C,
        payload: PayloadType,
    ) -> Result<C::Output> {
        let mut inner = self.lock_inner()?;
        if !inner
            .core
            .session()
            .is_some_and(|session| session.is_rmcp_plus() && session.is_activated())
        {
            return Err(Error::Protocol("no active RMCP+ session"));
        }

        let msg = inner
            .core
            .build_bmc_request(0, C::NETFN, C::CMD, &command.request_data())?;
        let start = Instant::now();
        let result = exchange_rmcp2(&mut inner, payload.as_u8(), msg).and_then(
            |(received_type, rsp)| {
                if received_type != payload.as_u8() {
                    return Err(Error::protocol_owned(format!(
                        "unexpected RMCP+ payload type {received_type:#04x}"
                    )));
                }
                ClientCore::bmc_response(&rsp)
            },
        );
        record("rmcp2", C::NETFN, C::CMD, start.elapsed(), &result);
        command.parse_response(result?)
    }

    /// `Get Device ID` (App NetFn, cmd 0x01).
    pub fn get_device_id(&self) -> Result<DeviceId> {
        self.execute(GetDeviceId)
    }

    /// `Get Channel Authentication Capabilities` (App NetFn, cmd 0x38).
    ///
    /// Controllers that reject the request for IPMI v2.0 data are asked
    /// again without it.
    pub fn get_channel_auth_capabilities(
        &self,
        channel: u8,
        privilege: PrivilegeLevel,
    ) -> Result<ChannelAuthCapabilities> {
        let cmd = GetChannelAuthCapabilities::new(channel, privilege);
        match self.execute(cmd) {
            Ok(caps) => Ok(caps),
            Err(Error::CompletionCode { .. }) => self.execute(cmd.without_v2_data()),
            Err(e) => Err(e),
        }
    }

    /// Relay Serial-over-LAN console output into `out` until `stop` is raised.
    ///
    /// Needs an active RMCP+ session. The SOL payload is activated with
    /// encryption and authentication and deactivated again when the relay
    /// ends, whether or not it ended with an error.
    pub fn start_sol<W: Write>(&self, stop: &AtomicBool, out: &mut W) -> Result<()> {
        {
            let inner = self.lock_inner()?;
            if !inner
                .core
                .session()
                .is_some_and(|session| session.is_rmcp_plus() && session.is_activated())
            {
                return Err(Error::NotSupported("SOL requires an active RMCP+ session"));
            }
        }

        self.send_and_receive_rmcp2(
            SetSessionPrivilegeLevel {
                privilege: PrivilegeLevel::Administrator,
            },
            PayloadType::Ipmi,
        )?;
        let activation =
            self.send_and_receive_rmcp2(ActivatePayload::sol(true, true), PayloadType::Ipmi)?;
        crate::observe::sol_started(activation.port);

        let relayed = self.relay_sol(stop, out);
        let deactivated = self.send_and_receive_rmcp2(DeactivatePayload::sol(), PayloadType::Ipmi);
        crate::observe::sol_stopped();
        relayed.and(deactivated)
    }

    fn relay_sol<W: Write>(&self, stop: &AtomicBool, out: &mut W) -> Result<()> {
        let mut relay = SolRelay::new();
        while !stop.load(Ordering::Relaxed) {
            let received = {
                let mut inner = self.lock_inner()?;
                if let Some(packet) = relay.outgoing() {
                    let datagram = inner.core.frame_sol(&packet)?;
                    inner.transport.send(&datagram)?;
                    inner.core.commit_sent();
                }
                match inner.transport.recv() {
                    Ok(datagram) => Some(inner.core.unwrap(&datagram)?),
                    Err(err) if err.is_timeout() => None,
                    Err(err) => return Err(err),
                }
            };

            let Some((received_type, payload)) = received else {
                continue;
            };
            if received_type != payload_type::SOL {
                crate::observe::unexpected_payload(received_type);
                continue;
            }
            if let Some(data) = relay.on_packet(SolPacket::unpack(&payload)?) {
                out.write_all(&data)?;
                out.flush()?;
            }
        }
        Ok(())
    }

    fn start_keep_alive(&self) -> Result<()> {
        let Some(interval) = self.keep_alive_interval else {
            return Ok(());
        };
        let inner = Arc::clone(&self.inner);
        let target = self.bmc_target.clone();
        let keep_alive = KeepAlive::spawn(interval, move || {
            let mut inner = lock(&inner)?;
            execute_locked(&mut inner, &target, &GetDeviceId).map(|_| ())
        })?;
        *self.lock_keep_alive() = Some(keep_alive);
        Ok(())
    }

    fn stop_keep_alive(&self) {
        // taken out first so the join happens without the slot locked
        let keep_alive = self.lock_keep_alive().take();
        if let Some(keep_alive) = keep_alive {
            keep_alive.stop();
        }
    }

    fn lock_keep_alive(&self) -> MutexGuard<'_, Option<KeepAlive>> {
        self.keep_alive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>> {
        lock(&self.inner)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.stop_keep_alive();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("bmc_target", &self.bmc_target)
            .field("privilege_level", &self.privilege_level)
            .field("keep_alive_interval", &self.keep_alive_interval)
            .finish_non_exhaustive()
    }
}

fn lock(inner: &Mutex<Inner>) -> Result<MutexGuard<'_, Inner>> {
    inner
        .lock()
        .map_err(|_| Error::Protocol("client lock poisoned"))
}

fn activate_v15(
    inner: &mut Inner,
    target: &Target,
    auth_type: AuthType,
    challenge: [u8; 16],
    privilege: PrivilegeLevel,
) -> Result<()> {
    // zero is reserved and the BMC increments before first use
    let initial_outbound_sequence = rand::rng().next_u32().clamp(1, u32::MAX - 1);
    let activated = execute_locked(
        inner,
        target,
        &ActivateSession {
            auth_type,
            privilege,
            challenge,
            initial_outbound_sequence,
        },
    )?;
    let negotiated = AuthType::from_u8(activated.auth_type).ok_or(Error::NotSupported(
        "BMC selected an unknown authentication type",
    ))?;

    inner
        .core
        .session_mut()
        .ok_or(Error::Protocol("session vanished during activation"))?
        .activate(
            negotiated,
            activated.session_id,
            activated.initial_inbound_sequence,
        );

    execute_locked(inner, target, &SetSessionPrivilegeLevel { privilege })?;
    Ok(())
}

fn execute_locked<C: Command>(inner: &mut Inner, target: &Target, command: &C) -> Result<C::Output> {
    let response = transact(
        inner,
        target,
        0,
        C::NETFN,
        C::CMD,
        &command.request_data(),
    )?;
    command.parse_response(response)
}

/// One request/response transaction; the caller holds the client lock.
fn transact(
    inner: &mut Inner,
    target: &Target,
    lun: u8,
    netfn: u8,
    cmd: u8,
    data: &[u8],
) -> Result<RawResponse> {
    let start = Instant::now();
    let result = transact_inner(inner, target, lun, netfn, cmd, data, start);
    record("lan", netfn, cmd, start.elapsed(), &result);
    result
}

fn transact_inner(
    inner: &mut Inner,
    target: &Target,
    lun: u8,
    netfn: u8,
    cmd: u8,
    data: &[u8],
    start: Instant,
) -> Result<RawResponse> {
    let (header, msg) = inner.core.build_request(target, lun, netfn, cmd, data)?;
    let datagram = inner.core.frame(payload_type::IPMI, msg)?;
    inner.transport.send(&datagram)?;
    inner.core.commit_sent();

    if let Some(rsp) = inner.core.take_pending(&header)? {
        return Ok(rsp);
    }
    loop {
        if start.elapsed() > inner.timeout {
            return Err(Error::Timeout);
        }
        let datagram = inner.transport.recv()?;
        if let Some(rsp) = inner.core.accept(&header, &datagram)? {
            return Ok(rsp);
        }
    }
}

/// Send `payload` as `kind` and unwrap the next datagram.
fn exchange_rmcp2(inner: &mut Inner, kind: u8, payload: Vec<u8>) -> Result<(u8, Vec<u8>)> {
    let datagram = inner.core.frame(kind, payload)?;
    inner.transport.send(&datagram)?;
    inner.core.commit_sent();
    let reply = inner.transport.recv()?;
    inner.core.unwrap(&reply)
}

fn record(mode: &'static str, netfn: u8, cmd: u8, elapsed: Duration, result: &Result<RawResponse>) {
    match result {
        Ok(rsp) => crate::observe::record_ok(mode, netfn, cmd, elapsed, rsp.completion_code),
        Err(err) => crate::observe::record_err(mode, netfn, cmd, elapsed, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::thread;

    use crate::client::fake::{FakeBmc, MANAGED_SID, V15_SID};

    fn builder() -> ClientBuilder {
        let target: SocketAddr = "127.0.0.1:623".parse().expect("addr");
        ClientBuilder::new(target).timeout(Duration::from_millis(50))
    }

    fn client(bmc: &FakeBmc) -> Client {
        builder().build_with_transport(Box::new(bmc.clone()))
    }

    fn session(password: &str) -> Session {
        let mut session = Session::new();
        session.set_credentials("admin", password).expect("credentials");
        session
    }

    fn active_session_id(client: &Client) -> Option<u32> {
        let inner = client.lock_inner().expect("lock");
        inner
            .core
            .session()
            .filter(|s| s.is_activated())
            .map(Session::session_id)
    }

    #[test]
    fn ping_gets_pong() {
        let bmc = FakeBmc::rmcp_plus("secret");
        client(&bmc).ping().expect("ping");
    }

    #[test]
    fn ping_times_out_against_a_silent_bmc() {
        let bmc = FakeBmc::rmcp_plus("secret");
        bmc.set_silent(true);
        assert!(client(&bmc).ping().expect_err("silent").is_timeout());
    }

    #[test]
    fn rmcp_plus_session_carries_encrypted_requests() {
        let bmc = FakeBmc::rmcp_plus("secret");
        let client = client(&bmc);
        client.establish_session(session("secret")).expect("establish");

        assert!(client.session_active());
        assert_eq!(active_session_id(&client), Some(MANAGED_SID));
        assert!(bmc.has_keys());

        let id = client.get_device_id().expect("device id");
        assert_eq!(id.device_id, 0x20);
        assert_eq!(id.manufacturer_id, 0x0002A2);
        // no keep-alive for RMCP+ sessions
        assert_eq!(bmc.count(0x06, 0x01), 1);
    }

    #[test]
    fn wrong_password_fails_rakp2_and_installs_no_keys() {
        let bmc = FakeBmc::rmcp_plus("secret");
        let client = client(&bmc);
        let err = client
            .establish_session(session("guess"))
            .expect_err("wrong password");
        assert!(matches!(err, Error::AuthenticationFailed(_)), "{err:?}");
        assert!(!client.session_active());
        assert!(
            client
                .lock_inner()
                .expect("lock")
                .core
                .session()
                .is_none()
        );
    }

    #[test]
    fn v15_md5_session_is_kept_alive_until_closed() {
        let bmc = FakeBmc::v15(AuthType::Md5, "secret");
        let client = builder()
            .keep_alive_interval(Some(Duration::from_millis(5)))
            .build_with_transport(Box::new(bmc.clone()));

        client.establish_session(session("secret")).expect("establish");
        assert_eq!(active_session_id(&client), Some(V15_SID));
        assert_eq!(bmc.count(0x06, 0x3B), 1);

        thread::sleep(Duration::from_millis(100));
        client.close_session().expect("close");
        let probes = bmc.count(0x06, 0x01);
        assert!(probes >= 1, "expected keep-alive probes");
        assert_eq!(bmc.count(0x06, 0x3C), 1);
        assert!(!client.session_active());

        thread::sleep(Duration::from_millis(30));
        assert_eq!(bmc.count(0x06, 0x01), probes);
    }

    #[test]
    fn keep_alive_can_be_disabled() {
        let bmc = FakeBmc::v15(AuthType::Password, "secret");
        let client = builder()
            .keep_alive_interval(None)
            .build_with_transport(Box::new(bmc.clone()));
        client.establish_session(session("secret")).expect("establish");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(bmc.count(0x06, 0x01), 0);
    }

    #[test]
    fn close_succeeds_when_the_bmc_is_gone() {
        let bmc = FakeBmc::rmcp_plus("secret");
        let client = client(&bmc);
        client.establish_session(session("secret")).expect("establish");

        bmc.set_silent(true);
        client.close_session().expect("close on timeout");
        assert!(!client.session_active());
    }

    #[test]
    fn close_is_idempotent() {
        let bmc = FakeBmc::rmcp_plus("secret");
        let client = client(&bmc);
        client.close_session().expect("close without session");

        client.establish_session(session("secret")).expect("establish");
        client.close_session().expect("first close");
        client.close_session().expect("second close");
        assert_eq!(bmc.count(0x06, 0x3C), 1);
    }

    #[test]
    fn neither_ipmi_version_is_not_supported() {
        let bmc = FakeBmc::unsupported();
        let err = client(&bmc)
            .establish_session(session("secret"))
            .expect_err("unsupported");
        assert!(matches!(err, Error::NotSupported(_)), "{err:?}");
    }

    #[test]
    fn stray_replies_do_not_break_the_transaction() {
        let bmc = FakeBmc::rmcp_plus("secret");
        let client = client(&bmc);
        client.establish_session(session("secret")).expect("establish");

        bmc.send_stray_reply();
        client.get_device_id().expect("device id");
        assert_eq!(
            client.lock_inner().expect("lock").core.pending_len(),
            1,
            "stray reply is queued, not dropped"
        );
    }

    #[test]
    fn raw_requests_need_a_command_byte() {
        let bmc = FakeBmc::rmcp_plus("secret");
        let client = client(&bmc);
        let target = Target::new(0x20);
        assert!(matches!(
            client.send_and_receive_raw(&target, 0, 0x06, &[]),
            Err(Error::InvalidArgument(_))
        ));

        let rsp = client
            .send_and_receive_raw(&target, 0, 0x06, &[0x55])
            .expect("raw");
        assert_eq!(rsp.completion_code, 0xC1);
    }

    #[test]
    fn rmcp2_exchange_needs_and_uses_the_session() {
        let bmc = FakeBmc::rmcp_plus("secret");
        let client = client(&bmc);
        assert!(matches!(
            client.send_and_receive_rmcp2(GetDeviceId, PayloadType::Ipmi),
            Err(Error::Protocol(_))
        ));

        client.establish_session(session("secret")).expect("establish");
        let id = client
            .send_and_receive_rmcp2(GetDeviceId, PayloadType::Ipmi)
            .expect("rmcp2");
        assert_eq!(id.product_id, 0x0100);
    }

    struct StopOnData<'a> {
        stop: &'a AtomicBool,
        seen: Vec<u8>,
    }

    impl Write for StopOnData<'_> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.seen.extend_from_slice(buf);
            self.stop.store(true, Ordering::Relaxed);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sol_relays_console_output() {
        let bmc = FakeBmc::rmcp_plus("secret");
        let client = client(&bmc);
        client.establish_session(session("secret")).expect("establish");

        let stop = AtomicBool::new(false);
        let mut out = StopOnData {
            stop: &stop,
            seen: Vec::new(),
        };
        client.start_sol(&stop, &mut out).expect("sol");

        assert_eq!(out.seen, b"login: ");
        let sent = bmc.sol_packets();
        assert_eq!(sent[0].data, b"\r");
        assert_eq!(sent[0].sequence, 1);
        assert_eq!(bmc.count(0x06, 0x48), 1);
        assert_eq!(bmc.count(0x06, 0x49), 1);
    }

    #[test]
    fn sol_is_refused_on_v15_sessions() {
        let bmc = FakeBmc::v15(AuthType::Md5, "secret");
        let client = builder()
            .keep_alive_interval(None)
            .build_with_transport(Box::new(bmc.clone()));
        client.establish_session(session("secret")).expect("establish");

        let stop = AtomicBool::new(false);
        let mut out = Vec::new();
        assert!(matches!(
            client.start_sol(&stop, &mut out),
            Err(Error::NotSupported(_))
        ));
    }
}
