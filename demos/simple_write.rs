//! Example: Writing data to PLC memory
//!
//! Run with: cargo run --example simple_write --features snap7
//!
//! This example demonstrates:
//! - Writing raw bytes and typed values
//! - Preparing a buffer with the utility setters
//! - Handling errors by kind

use s7_session::utils::{set_bool, set_int, set_real, set_string};
use s7_session::{Area, Client, ErrorKind, Snap7Engine, Values, WordLen};

fn main() -> s7_session::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = Client::new(Snap7Engine::new());
    client.connect("192.168.0.10", 0, 2, 102)?;

    // =========================================================================
    // Build a DB image and write it
    // =========================================================================

    let mut buffer = vec![0u8; 32];
    set_bool(&mut buffer, 0, 0, true)?;
    set_int(&mut buffer, 2, -200)?;
    set_real(&mut buffer, 4, 21.5)?;
    set_string(&mut buffer, 8, "LINE-01", 20)?;

    client.db_write(1, 0, &buffer)?;
    println!("DB1.DBB0..31 written");

    // =========================================================================
    // Typed writes
    // =========================================================================

    client.write_values(Area::Markers, 10, WordLen::Word, &Values::Words(vec![0x1234, 0x5678]))?;
    client.ct_write(0, &[0x0010])?;
    println!("MW10, MW12 and C0 written");

    // =========================================================================
    // Error handling
    // =========================================================================

    match client.db_write(9999, 0, &[0xFF]) {
        Ok(()) => println!("DB9999 written"),
        Err(e) if e.kind() == ErrorKind::EngineWriteFailure => {
            println!("PLC refused the write: {} (code 0x{:08X})", e, e.native_code().unwrap_or(0));
        }
        Err(e) => return Err(e),
    }

    client.disconnect()
}
