//! Example: Fire-and-poll jobs
//!
//! Run with: cargo run --example async_jobs --features snap7
//!
//! This example demonstrates:
//! - Submitting a read and polling it between other work
//! - Waiting on a write with a deadline
//! - The per-kind limit on outstanding jobs

use std::thread;
use std::time::Duration;

use s7_session::{Client, ClientConfig, Completion, S7Error, Snap7Engine};

fn main() -> s7_session::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config =
        ClientConfig::new("192.168.0.10", 0, 2).with_poll_interval(Duration::from_millis(5));
    let client = Client::new(Snap7Engine::new());
    client.connect_with(&config)?;

    // =========================================================================
    // Poll a read
    // =========================================================================

    let read = client.as_db_read(1, 0, 64)?;

    // A second read while the first is outstanding is refused.
    if let Err(e @ S7Error::OperationInProgress { .. }) = client.as_db_read(2, 0, 8) {
        println!("second read refused: {}", e);
    }

    let data = loop {
        match client.check_completion(&read)? {
            Completion::Pending => thread::sleep(Duration::from_millis(1)),
            Completion::Done(bytes) => break bytes,
            Completion::Failed(e) => return Err(e),
        }
    };
    println!("DB1: {:02X?}", &data[..8]);

    // =========================================================================
    // Wait on a write
    // =========================================================================

    let write = client.as_db_write(1, 0, &data[..4])?;
    match client.wait_completion(&write, Duration::from_secs(2)) {
        Ok(()) => println!("write done"),
        Err(e @ S7Error::Timeout { .. }) => println!("still running: {}", e),
        Err(e) => println!("write failed: {}", e),
    }

    client.disconnect()
}
