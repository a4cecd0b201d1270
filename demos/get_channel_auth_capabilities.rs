use std::time::Duration;

use ipmi_lan::{ClientBuilder, PrivilegeLevel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example:
    //   cargo run --example get_channel_auth_capabilities -- 192.168.1.10:623 0x0e admin
    let mut args = std::env::args().skip(1);
    let target = args.next().ok_or("missing <host:port>")?.parse()?;
    let channel_str = args.next().unwrap_or_else(|| "0x0e".to_string());
    let privilege_str = args.next().unwrap_or_else(|| "admin".to_string());

    let channel = parse_u8(&channel_str)?;
    let privilege = parse_privilege(&privilege_str)?;

    // no session needed; the command is accepted outside of one
    let client = ClientBuilder::new(target)
        .timeout(Duration::from_secs(2))
        .build()?;

    let caps = client.get_channel_auth_capabilities(channel, privilege)?;
    println!("Channel Auth Capabilities: {caps:?}");
    println!(
        "IPMI v2.0: {}, IPMI v1.5: {}, best v1.5 auth: {:?}",
        caps.ipmi_2_0(),
        caps.ipmi_1_5(),
        caps.max_auth_type()
    );

    Ok(())
}

fn parse_u8(s: &str) -> Result<u8, Box<dyn std::error::Error>> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u8::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u8>()?)
    }
}

fn parse_privilege(s: &str) -> Result<PrivilegeLevel, Box<dyn std::error::Error>> {
    let value = s.to_ascii_lowercase();
    match value.as_str() {
        "admin" | "administrator" => Ok(PrivilegeLevel::Administrator),
        "operator" | "oper" => Ok(PrivilegeLevel::Operator),
        "user" => Ok(PrivilegeLevel::User),
        "callback" => Ok(PrivilegeLevel::Callback),
        "oem" => Ok(PrivilegeLevel::Oem),
        _ => Err("invalid privilege (admin|operator|user|callback|oem)".into()),
    }
}
