use std::time::Duration;

use ipmi_lan::commands::GetDeviceId;
use ipmi_lan::{ClientBuilder, Routing, Session, Target};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example (satellite controller 0x72 behind the BMC on channel 7):
    //   cargo run --example bridged_get_device_id -- 192.168.1.10:623 admin password 0x72 7
    let mut args = std::env::args().skip(1);
    let target = args.next().ok_or("missing <host:port>")?.parse()?;
    let username = args.next().ok_or("missing <username>")?;
    let password = args.next().ok_or("missing <password>")?;
    let address = parse_u8(&args.next().ok_or("missing <ipmb address>")?)?;
    let channel = parse_u8(&args.next().ok_or("missing <channel>")?)?;

    let client = ClientBuilder::new(target)
        .timeout(Duration::from_secs(2))
        .build()?;

    let mut session = Session::new();
    session.set_credentials(username, password)?;
    client.establish_session(session)?;

    let satellite = Target::with_routing(
        address,
        vec![
            Routing::new(0x81, 0x20, 0),
            Routing::new(0x20, address, channel),
        ],
    );
    let result = client.send_and_receive(&satellite, GetDeviceId);
    client.close_session()?;

    println!("Device behind {address:#04x}: {:?}", result?);
    Ok(())
}

fn parse_u8(s: &str) -> Result<u8, Box<dyn std::error::Error>> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u8::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u8>()?)
    }
}
