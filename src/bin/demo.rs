//! Voltage Modbus ASCII Demo
//!
//! Demonstrates the voltage_modbus_ascii library features including:
//! - ASCII frame encoding with LRC (no connection required)
//! - Basic read/write operations over ASCII/TCP
//! - Diagnostics and comm event counters
//!
//! Usage: cargo run --bin demo [server_address] [unit_id]
//! Example: cargo run --bin demo 127.0.0.1:502 1

use std::time::Duration;
use tokio::time::sleep;
use voltage_modbus_ascii::frame::{decode_frame, encode_frame, lrc};
use voltage_modbus_ascii::{
    CallbackLogger, MasterConfig, ModbusAsciiTcpClient, ModbusClient, ModbusError, PduBuilder,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 {}", voltage_modbus_ascii::info());
    println!("=============================\n");

    // =========================================================================
    // Part 1: ASCII framing (No connection required)
    // =========================================================================
    println!("📦 Part 1: ASCII Frames");
    println!("-----------------------");

    let request = PduBuilder::build_read_request(0x03, 0x0000, 2)?;
    let frame = encode_frame(1, request.as_slice());
    println!(
        "  FC03 request for unit 1: {}",
        String::from_utf8_lossy(&frame).trim_end()
    );
    println!("  LRC: 0x{:02X}", lrc(&[&[1u8][..], request.as_slice()].concat()));

    let (unit, pdu) = decode_frame(b":010304000A000BE3\r\n")?;
    println!("  Decoded response from unit {}: {:02X?}", unit, pdu.as_slice());

    match decode_frame(b":010304000A000BE4\r\n") {
        Err(ModbusError::InvalidResponse { message, .. }) => {
            println!("  Corrupted frame rejected: {}", message)
        }
        other => println!("  Unexpected: {:?}", other),
    }

    // =========================================================================
    // Part 2: ASCII/TCP client (requires Modbus ASCII device or gateway)
    // =========================================================================
    println!("\n🔌 Part 2: Client Operations");
    println!("----------------------------");

    let server_address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:502".to_string());
    let unit_id: u8 = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);

    println!("  Connecting to {}...", server_address);

    let config = MasterConfig::new().with_timeout(Duration::from_millis(1000));
    let mut client = match ModbusAsciiTcpClient::connect_with_config(&server_address, &config).await {
        Ok(client) => {
            println!("  ✅ Connected successfully!");
            client
        }
        Err(e) => {
            println!("  ⚠️  Connection failed: {}", e);
            println!("  (This is expected if no Modbus device is running)");
            println!("\n🎉 Demo completed! (client operations skipped)");
            return Ok(());
        }
    };
    client.set_logger(Some(CallbackLogger::console()));

    println!("\n  📖 Read Operations:");

    match client.read_03(unit_id, 0, 5).await {
        Ok(values) => println!("    FC03 Holding registers 0-4: {:?}", values),
        Err(e) => println!("    FC03 Error: {} (status {})", e, e.status_code()),
    }

    sleep(Duration::from_millis(50)).await;

    match client.read_01(unit_id, 0, 8).await {
        Ok(coils) => {
            let states: Vec<&str> = coils.iter().map(|&c| if c { "ON" } else { "OFF" }).collect();
            println!("    FC01 Coils 0-7: {:?}", states);
        }
        Err(e) => println!("    FC01 Error: {}", e),
    }

    println!("\n  ✏️  Write Operations:");

    match client.write_06(unit_id, 100, 0x1234).await {
        Ok(_) => println!("    FC06 Wrote register 100 = 0x1234"),
        Err(e) => println!("    FC06 Error: {}", e),
    }

    match client.write_06(0xFF, 100, 0x1234).await {
        Ok(_) => println!("    FC06 Broadcast sent (no response expected)"),
        Err(e) => println!("    FC06 Broadcast Error: {}", e),
    }

    println!("\n  🩺 Diagnostics:");

    match client.return_query_data(unit_id, &[0xA5, 0x37]).await {
        Ok(_) => println!("    Query data echoed"),
        Err(e) => println!("    Return Query Data Error: {}", e),
    }

    match client.return_bus_message_count(unit_id).await {
        Ok(count) => println!("    Bus messages: {}", count),
        Err(e) => println!("    Bus Message Count Error: {}", e),
    }

    match client.get_comm_event_counter(unit_id).await {
        Ok(counter) => println!("    Comm events: {} ({:?})", counter.event_count, counter.status),
        Err(e) => println!("    FC0B Error: {}", e),
    }

    let stats = client.get_stats();
    println!("\n  📊 Statistics:");
    println!("    Frames sent: {}, timeouts: {}", stats.frames_sent, stats.timeouts);
    println!("    Bytes sent: {}, received: {}", stats.bytes_sent, stats.bytes_received);

    if let Err(e) = client.close().await {
        eprintln!("  ⚠️  Close error: {}", e);
    }

    println!("\n🎉 Demo completed!");
    Ok(())
}
