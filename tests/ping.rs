#![cfg(feature = "blocking")]

use std::net::UdpSocket;
use std::time::{Duration, Instant};

use ipmi_lan::{ClientBuilder, Error};

#[test]
fn ping_against_a_silent_host_times_out() {
    // bound but never answered
    let silent = UdpSocket::bind("127.0.0.1:0").expect("bind");
    let target = silent.local_addr().expect("local addr");

    let client = ClientBuilder::new(target)
        .timeout(Duration::from_millis(100))
        .build()
        .expect("build");

    let start = Instant::now();
    let err = client.ping().expect_err("no pong");
    assert!(matches!(err, Error::Timeout), "{err:?}");
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn ping_reaches_the_host() {
    let silent = UdpSocket::bind("127.0.0.1:0").expect("bind");
    silent
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("timeout");
    let target = silent.local_addr().expect("local addr");

    let client = ClientBuilder::new(target)
        .timeout(Duration::from_millis(50))
        .build()
        .expect("build");
    let _ = client.ping();

    let mut buf = [0u8; 64];
    let n = silent.recv(&mut buf).expect("ping datagram");
    // RMCP v1.0, no ack, ASF class; ASF IANA 4542; Presence Ping
    assert_eq!(&buf[..4], &[0x06, 0x00, 0xFF, 0x06]);
    assert_eq!(&buf[4..8], &4542u32.to_be_bytes());
    assert_eq!(buf[8], 0x80);
    assert_eq!(n, 12);
}
