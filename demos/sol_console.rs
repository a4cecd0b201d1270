use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use ipmi_lan::{ClientBuilder, Session};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example:
    //   cargo run --example sol_console -- 192.168.1.10:623 admin password 30
    let mut args = std::env::args().skip(1);
    let target = args.next().ok_or("missing <host:port>")?.parse()?;
    let username = args.next().ok_or("missing <username>")?;
    let password = args.next().ok_or("missing <password>")?;
    let seconds: u64 = args.next().unwrap_or_else(|| "30".to_string()).parse()?;

    let client = ClientBuilder::new(target)
        .timeout(Duration::from_millis(500))
        .build()?;

    let mut session = Session::new();
    session.set_credentials(username, password)?;
    client.establish_session(session)?;

    let stop = Arc::new(AtomicBool::new(false));
    let timer = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(seconds));
            stop.store(true, Ordering::Relaxed);
        })
    };

    let mut stdout = std::io::stdout();
    let relayed = client.start_sol(&stop, &mut stdout);
    let _ = timer.join();
    client.close_session()?;
    relayed?;

    Ok(())
}
