#[cfg(feature = "async")]
mod enabled {
    use std::time::Duration;

    use ipmi_lan::commands::GetDeviceId;
    use ipmi_lan::{ClientBuilder, Session};

    #[tokio::main(flavor = "current_thread")]
    pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
        // Example:
        //   cargo run --example tokio_ping --features async -- 192.168.1.10:623 admin password
        let mut args = std::env::args().skip(1);
        let target = args.next().ok_or("missing <host:port>")?.parse()?;

        let client = ClientBuilder::new(target)
            .timeout(Duration::from_secs(2))
            .build_async()
            .await?;
        client.ping().await?;
        println!("{target}: pong");

        if let (Some(username), Some(password)) = (args.next(), args.next()) {
            let mut session = Session::new();
            session.set_credentials(username, password)?;
            client.establish_session(session).await?;
            let device_id = client.execute(GetDeviceId).await?;
            println!("Device: {device_id:?}");
            client.close_session().await?;
        }

        Ok(())
    }
}

#[cfg(feature = "async")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    enabled::main()
}

#[cfg(not(feature = "async"))]
fn main() {
    eprintln!("This example requires feature `async`.");
}
