//! # Voltage Modbus ASCII - Modbus ASCII Master Protocol Engine
//!
//! **Version:** 0.1.0
//! **License:** MIT
//!
//! An async Modbus master for the ASCII framing, over TCP or a serial line.
//!
//! ## Features
//!
//! - **Layered**: PDU engine, ASCII frame codec and byte transport are
//!   separate traits composed by [`GenericModbusClient`]
//! - **Deadline-driven receive**: one deadline per response frame, never
//!   reset by partial receives
//! - **Strict validation**: arguments are checked before any I/O and every
//!   response shape is verified before decoding
//! - **Typed errors**: six error kinds, each with a flat status code
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Client |
//! |------|----------|--------|
//! | 0x01 | Read Coils | ✅ |
//! | 0x02 | Read Discrete Inputs | ✅ |
//! | 0x03 | Read Holding Registers | ✅ |
//! | 0x04 | Read Input Registers | ✅ |
//! | 0x05 | Write Single Coil | ✅ |
//! | 0x06 | Write Single Register | ✅ |
//! | 0x07 | Read Exception Status | ✅ |
//! | 0x08 | Diagnostics | ✅ |
//! | 0x0B | Get Comm Event Counter | ✅ |
//! | 0x0C | Get Comm Event Log | ✅ |
//! | 0x0F | Write Multiple Coils | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ |
//! | 0x11 | Report Server ID | ✅ |
//! | 0x16 | Mask Write Register | ✅ |
//! | 0x17 | Read/Write Multiple Registers | ✅ |
//! | 0x18 | Read FIFO Queue | ✅ |
//! | 0x2B | Encapsulated Interface Transport | ✅ |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_modbus_ascii::{ModbusAsciiTcpClient, ModbusClient, ModbusResult};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let mut client =
//!         ModbusAsciiTcpClient::connect("127.0.0.1:502", Duration::from_secs(1)).await?;
//!
//!     let values = client.read_03(1, 0, 10).await?;
//!     println!("Read registers: {:?}", values);
//!
//!     client.write_06(1, 100, 0x1234).await?;
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants based on official specification
pub mod constants;

/// Function codes, exception codes and structured results
pub mod protocol;

/// Stack-allocated PDU, request builders and response checks
pub mod pdu;

/// Byte transports for TCP and serial lines
pub mod transport;

/// ASCII framing and the receive state machine
pub mod frame;

/// Modbus client implementations
pub mod client;

/// Diagnostics (0x08) sub-functions
pub mod diagnostics;

/// Logging system for the library
pub mod logging;

/// Master configuration
pub mod config;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use voltage_modbus_ascii::tokio) ===
pub use tokio;

// === Core client API ===
pub use client::{GenericModbusClient, ModbusAsciiTcpClient, ModbusClient};
pub use config::MasterConfig;

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Core types ===
pub use protocol::{
    CommEvent, CommEventCounter, CommEventLog, CommStatus, DiagnosticSubFunction,
    ModbusException, ModbusFunction, ServerId, UnitId,
};

// === Framing and transport ===
pub use frame::{AsciiFrameCodec, FrameCodec};
pub use transport::{ModbusTransport, TcpTransport, TransportStats};

// === Protocol limits (commonly needed constants) ===
pub use constants::{
    BROADCAST_UNIT_ID, MAX_PDU_SIZE, MAX_READ_COILS, MAX_READ_REGISTERS, MAX_WRITE_COILS,
    MAX_WRITE_REGISTERS,
};

// === Logging ===
pub use logging::{CallbackLogger, LogCallback, LogLevel, LoggingMode};

// === PDU (advanced usage) ===
pub use pdu::{ModbusPdu, PduBuilder};

#[cfg(feature = "serial")]
pub use client::ModbusAsciiSerialClient;

#[cfg(feature = "serial")]
pub use transport::SerialTransport;

/// Modbus TCP default port
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!(
        "Voltage Modbus ASCII v{} - Modbus ASCII master over TCP and serial lines",
        VERSION
    )
}
