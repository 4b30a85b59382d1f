//! Modbus protocol constants based on the official specification
//!
//! - Maximum PDU size: 253 bytes (inherited from RS485 ADU limit of 256 bytes)
//! - Register/coil limits are calculated to fit within the PDU size constraint
//! - ASCII framing doubles every byte into two hex characters

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum PDU (Protocol Data Unit) size per Modbus specification
///
/// RS485 ADU (256 bytes) - Slave Address (1 byte) - CRC (2 bytes) = 253 bytes
pub const MAX_PDU_SIZE: usize = 253;

/// Size of an exception response PDU: function code | 0x80, exception code
pub const EXCEPTION_PDU_SIZE: usize = 2;

/// Bit set in the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Unit address meaning "all devices"; requests to it never get a response
pub const BROADCAST_UNIT_ID: u8 = 0xFF;

// ============================================================================
// ASCII Frame Constants
// ============================================================================

/// ASCII frame start marker
pub const ASCII_START: u8 = b':';

/// ASCII frame terminator, first byte
pub const ASCII_CR: u8 = b'\r';

/// ASCII frame terminator, second byte
pub const ASCII_LF: u8 = b'\n';

/// Shortest ASCII frame the receiver treats as complete
///
/// Start marker, address + function code + LRC as 6 hex characters, CR LF.
/// A CR LF seen earlier is read as data, so a truncated frame waits for the
/// deadline instead of completing.
pub const MIN_ASCII_FRAME_SIZE: usize = 1 + 3 * 2 + 2;

/// Longest ASCII frame the receiver accepts
///
/// Calculation:
/// - Start marker: 1
/// - Address + max PDU + LRC: (1 + 253 + 1) × 2 hex characters = 510
/// - CR LF: 2
/// - Total: 513
pub const MAX_ASCII_FRAME_SIZE: usize = 1 + (1 + MAX_PDU_SIZE + 1) * 2 + 2;

// ============================================================================
// Timeouts
// ============================================================================

/// Default response timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Smallest timeout accepted by [`MasterConfig`](crate::config::MasterConfig)
pub const MIN_TIMEOUT_MS: u64 = 100;

/// Largest timeout accepted by [`MasterConfig`](crate::config::MasterConfig)
pub const MAX_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03/FC04 (Read Holding/Input Registers)
///
/// Response PDU: 1 (FC) + 1 (byte count) + N × 2 ≤ 253 → N ≤ 125
pub const MAX_READ_REGISTERS: u16 = 125;

/// Maximum number of registers for FC16 (Write Multiple Registers)
///
/// Request PDU: 1 + 2 + 2 + 1 + N × 2 ≤ 253 → N ≤ 123
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Maximum number of registers written by FC23 (Read/Write Multiple Registers)
///
/// Request PDU: 1 + 2 + 2 + 2 + 2 + 1 + N × 2 ≤ 253 → N ≤ 121
pub const MAX_READ_WRITE_WRITE_REGISTERS: u16 = 121;

/// Maximum number of values in a FIFO queue (FC24)
pub const MAX_FIFO_COUNT: u16 = 31;

// ============================================================================
// Coil Operation Limits
// ============================================================================

/// Maximum number of coils for FC01/FC02 (Read Coils/Discrete Inputs)
pub const MAX_READ_COILS: u16 = 2000;

/// Maximum number of coils for FC15 (Write Multiple Coils)
pub const MAX_WRITE_COILS: u16 = 1968;

/// Maximum number of event bytes in a comm event log (FC12)
pub const MAX_COMM_EVENTS: usize = 64;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Read Exception Status (FC07)
pub const FC_READ_EXCEPTION_STATUS: u8 = 0x07;

/// Diagnostics (FC08)
pub const FC_DIAGNOSTICS: u8 = 0x08;

/// Get Comm Event Counter (FC11)
pub const FC_GET_COMM_EVENT_COUNTER: u8 = 0x0B;

/// Get Comm Event Log (FC12)
pub const FC_GET_COMM_EVENT_LOG: u8 = 0x0C;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Report Server ID (FC17)
pub const FC_REPORT_SERVER_ID: u8 = 0x11;

/// Mask Write Register (FC22)
pub const FC_MASK_WRITE_REGISTER: u8 = 0x16;

/// Read/Write Multiple Registers (FC23)
pub const FC_READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;

/// Read FIFO Queue (FC24)
pub const FC_READ_FIFO_QUEUE: u8 = 0x18;

/// Encapsulated Interface Transport (FC43)
pub const FC_ENCAPSULATED_INTERFACE_TRANSPORT: u8 = 0x2B;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Server Device Failure
pub const EXCEPTION_SERVER_DEVICE_FAILURE: u8 = 0x04;

/// Acknowledge
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;

/// Server Device Busy
pub const EXCEPTION_SERVER_DEVICE_BUSY: u8 = 0x06;

/// Memory Parity Error
pub const EXCEPTION_MEMORY_PARITY_ERROR: u8 = 0x08;

/// Gateway Path Unavailable
pub const EXCEPTION_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;

/// Gateway Target Device Failed to Respond
pub const EXCEPTION_GATEWAY_TARGET_FAILED: u8 = 0x0B;

// ============================================================================
// Status Codes (flat exported-API mapping)
// ============================================================================

/// Operation succeeded
pub const STATUS_SUCCESS: i32 = 0;

/// Unclassified failure
pub const STATUS_FAIL: i32 = 1;

/// Transport (socket / serial) failure
pub const STATUS_TRANSPORT_ERROR: i32 = 2;

/// No response before the deadline
pub const STATUS_TIMEOUT_ERROR: i32 = 3;

/// Frame or response PDU format error
pub const STATUS_RESPONSE_ERROR: i32 = 4;

/// Invalid argument
pub const STATUS_INVALID_ARGUMENT: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_constants() {
        assert_eq!(MAX_PDU_SIZE, 253);
        assert_eq!(EXCEPTION_PDU_SIZE, 2);
        assert_eq!(MAX_ASCII_FRAME_SIZE, 513);
        assert_eq!(MIN_ASCII_FRAME_SIZE, 9);
    }

    #[test]
    fn test_register_limits() {
        let read_pdu_size = 1 + 1 + (MAX_READ_REGISTERS as usize * 2);
        assert!(read_pdu_size <= MAX_PDU_SIZE);

        let write_pdu_size = 1 + 2 + 2 + 1 + (MAX_WRITE_REGISTERS as usize * 2);
        assert!(write_pdu_size <= MAX_PDU_SIZE);

        let rw_pdu_size = 1 + 2 + 2 + 2 + 2 + 1 + (MAX_READ_WRITE_WRITE_REGISTERS as usize * 2);
        assert!(rw_pdu_size <= MAX_PDU_SIZE);
    }

    #[test]
    fn test_coil_limits() {
        let read_coil_pdu = 1 + 1 + (MAX_READ_COILS as usize).div_ceil(8);
        assert!(read_coil_pdu <= MAX_PDU_SIZE);

        let write_coil_pdu = 1 + 2 + 2 + 1 + (MAX_WRITE_COILS as usize).div_ceil(8);
        assert!(write_coil_pdu <= MAX_PDU_SIZE);
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(MIN_TIMEOUT_MS <= DEFAULT_TIMEOUT_MS);
        assert!(DEFAULT_TIMEOUT_MS <= MAX_TIMEOUT_MS);
    }
}
