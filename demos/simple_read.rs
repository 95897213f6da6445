//! Example: Reading data from PLC memory
//!
//! Run with: cargo run --example simple_read --features snap7
//!
//! This example demonstrates:
//! - Connecting with a `ClientConfig`
//! - Reading bytes from the data block and marker areas
//! - Decoding S7 types with the utility functions
//! - Querying block and CPU information

use s7_session::utils::{format_bits, get_bool, get_int, get_real, get_string};
use s7_session::{Area, BlockType, Client, ClientConfig, Param, Snap7Engine, WordLen};

fn main() -> s7_session::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // =========================================================================
    // Connect to PLC
    // =========================================================================

    let config = ClientConfig::new("192.168.0.10", 0, 2).with_param(Param::PduRequest, 480);
    let client = Client::new(Snap7Engine::new());
    client.connect_with(&config)?;

    let pdu = client.pdu_length()?;
    println!("PDU requested {} negotiated {}", pdu.requested, pdu.negotiated);
    println!("CPU status: {}", client.plc_status()?);

    // =========================================================================
    // Reading bytes
    // =========================================================================

    println!("\n=== DB1 ===\n");

    let db = client.db_read(1, 0, 32)?;
    println!("DB1.DBX0.0 = {}", get_bool(&db, 0, 0)?);
    println!("DB1.DBW2   = {}", get_int(&db, 2)?);
    println!("DB1.DBD4   = {}", get_real(&db, 4)?);
    println!("DB1.DBB8   = {:?}", get_string(&db, 8)?);

    let markers = client.mb_read(0, 1)?;
    println!("MB0 = {}", format_bits(markers[0]));

    // =========================================================================
    // Typed values
    // =========================================================================

    println!("\n=== Typed reads ===\n");

    let reals = client.read_values(Area::DataBlock(1), 4, 2, WordLen::Real)?;
    println!("DB1 reals: {:?}", reals);

    let timers = client.tm_read(0, 4)?;
    println!("T0..T3: {:04X?}", timers);

    // =========================================================================
    // Blocks
    // =========================================================================

    println!("\n=== Blocks ===\n");

    let blocks = client.list_blocks()?;
    println!(
        "{} OBs, {} FBs, {} FCs, {} DBs",
        blocks.ob_count, blocks.fb_count, blocks.fc_count, blocks.db_count
    );

    for number in client.list_blocks_of_type(BlockType::DB, 16)? {
        let info = client.block_info(BlockType::DB, number)?;
        println!("DB{}: {} bytes, author {:?}", number, info.mc7_size, info.author);
    }

    client.disconnect()
}
