use std::time::Duration;

use crate::error::Error;

pub(crate) fn record_ok(
    mode: &'static str,
    netfn: u8,
    cmd: u8,
    elapsed: Duration,
    completion_code: u8,
) {
    let _ = (mode, netfn, cmd, elapsed, completion_code);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("ipmi_requests_total", "mode" => mode, "outcome" => "ok").increment(1);
        metrics::histogram!("ipmi_request_seconds", "mode" => mode).record(elapsed.as_secs_f64());
        if completion_code != 0x00 {
            metrics::counter!("ipmi_completion_code_nonzero_total", "mode" => mode).increment(1);
        }
    }

    #[cfg(feature = "tracing")]
    {
        tracing::debug!(
            mode,
            netfn,
            cmd,
            completion_code,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "ipmi request ok"
        );
    }
}

pub(crate) fn record_err(mode: &'static str, netfn: u8, cmd: u8, elapsed: Duration, err: &Error) {
    let _ = (mode, netfn, cmd, elapsed, err);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("ipmi_requests_total", "mode" => mode, "outcome" => "err").increment(1);
        metrics::counter!(
            "ipmi_request_errors_total",
            "mode" => mode,
            "kind" => error_kind(err)
        )
        .increment(1);
        metrics::histogram!("ipmi_request_seconds", "mode" => mode).record(elapsed.as_secs_f64());
    }

    #[cfg(feature = "tracing")]
    {
        tracing::warn!(
            mode,
            netfn,
            cmd,
            error = %err,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "ipmi request failed"
        );
    }
}

pub(crate) fn session_established(mode: &'static str, session_id: u32) {
    let _ = (mode, session_id);

    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_sessions_established_total", "mode" => mode).increment(1);

    #[cfg(feature = "tracing")]
    tracing::debug!(mode, session_id = format_args!("{session_id:#010x}"), "session established");
}

pub(crate) fn session_closed(session_id: u32) {
    let _ = session_id;

    #[cfg(feature = "tracing")]
    tracing::debug!(session_id = format_args!("{session_id:#010x}"), "session closed");
}

pub(crate) fn pong(supports_ipmi: bool) {
    let _ = supports_ipmi;

    #[cfg(feature = "tracing")]
    tracing::debug!(supports_ipmi, "asf pong received");
}

pub(crate) fn keep_alive_missed() {
    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_keep_alive_missed_total").increment(1);

    #[cfg(feature = "tracing")]
    tracing::debug!("keep-alive probe timed out");
}

pub(crate) fn keep_alive_failed(err: &Error) {
    let _ = err;

    #[cfg(feature = "tracing")]
    tracing::warn!(error = %err, "keep-alive probe failed");
}

/// A received IPMB message did not answer the request in flight.
pub(crate) fn rx_mismatch(what: &str) {
    let _ = what;

    #[cfg(feature = "tracing")]
    tracing::trace!(field = what, "ipmb reply does not match request");
}

pub(crate) fn unexpected_payload(payload_type: u8) {
    let _ = payload_type;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        payload_type = format_args!("{payload_type:#04x}"),
        "ignoring unexpected payload"
    );
}

pub(crate) fn sol_started(port: u16) {
    let _ = port;

    #[cfg(feature = "tracing")]
    tracing::debug!(port, "sol payload activated");
}

pub(crate) fn sol_stopped() {
    #[cfg(feature = "tracing")]
    tracing::debug!("sol payload deactivated");
}

#[cfg(feature = "metrics")]
fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::Io(_) => "io",
        Error::Timeout => "timeout",
        Error::Decoding(_) | Error::DecodingOwned(_) => "decoding",
        Error::Protocol(_) | Error::ProtocolOwned(_) => "protocol",
        Error::AuthenticationFailed(_) => "authentication",
        Error::IntegrityCheckFailed(_) => "integrity",
        Error::Crypto(_) => "crypto",
        Error::NotSupported(_) => "not_supported",
        Error::InvalidArgument(_) => "invalid_argument",
        Error::CompletionCode { .. } => "completion_code",
    }
}
