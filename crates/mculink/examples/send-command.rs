//! Send a command, then sample telemetry for one second.
//!
//! Start a simulated device:
//!   cargo run --features cli -- simulate /tmp/mculink-sim.sock
//!
//! In another terminal:
//!   cargo run --example send-command -- unix:/tmp/mculink-sim.sock LED:on

use std::thread;
use std::time::Duration;

use mculink::session::Session;
use mculink::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let endpoint = Endpoint::parse(
        &args
            .next()
            .unwrap_or_else(|| "unix:/tmp/mculink-sim.sock".to_string()),
    )?;
    let command = args.next().unwrap_or_else(|| "PING".to_string());

    let session = Session::builder()
        .observer(|fps: u32| eprintln!("updates/s: {fps}"))
        .build();
    session.connect_endpoint(&endpoint)?;
    eprintln!("Connected to {endpoint}");

    let reply = session.send(&command)?;
    println!("{command} -> {} (id {})", reply.body, reply.correlation_id);

    session.begin_telemetry()?;
    thread::sleep(Duration::from_secs(1));
    session.stop_telemetry()?;

    let snapshot = session.telemetry();
    println!(
        "latest state: {}",
        snapshot.latest_value.as_deref().unwrap_or("-")
    );

    session.disconnect();
    Ok(())
}
