use std::time::Duration;

use ipmi_lan::ClientBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example:
    //   cargo run --example ping -- 192.168.1.10:623
    let target = std::env::args()
        .nth(1)
        .ok_or("missing <host:port>")?
        .parse()?;

    let client = ClientBuilder::new(target)
        .timeout(Duration::from_secs(1))
        .build()?;

    match client.ping() {
        Ok(()) => println!("{target}: pong"),
        Err(e) if e.is_timeout() => println!("{target}: no answer"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
