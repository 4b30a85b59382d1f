//! Modbus protocol definitions
//!
//! Function codes, exception codes, diagnostic sub-functions and the
//! structured records returned by the master's non-register functions.

use std::fmt;

use crate::constants::{
    BROADCAST_UNIT_ID, EXCEPTION_ACKNOWLEDGE, EXCEPTION_FLAG, EXCEPTION_GATEWAY_PATH_UNAVAILABLE,
    EXCEPTION_GATEWAY_TARGET_FAILED, EXCEPTION_ILLEGAL_DATA_ADDRESS, EXCEPTION_ILLEGAL_DATA_VALUE,
    EXCEPTION_ILLEGAL_FUNCTION, EXCEPTION_MEMORY_PARITY_ERROR, EXCEPTION_SERVER_DEVICE_BUSY,
    EXCEPTION_SERVER_DEVICE_FAILURE,
};
use crate::error::{ModbusError, ModbusResult};

/// Modbus unit address (slave id). 0xFF is broadcast.
pub type UnitId = u8;

/// Check whether a unit address is the broadcast address
#[inline]
pub fn is_broadcast(unit_id: UnitId) -> bool {
    unit_id == BROADCAST_UNIT_ID
}

/// Modbus function codes supported by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModbusFunction {
    /// Read Coils (0x01)
    ReadCoils = 0x01,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = 0x02,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = 0x03,
    /// Read Input Registers (0x04)
    ReadInputRegisters = 0x04,
    /// Write Single Coil (0x05)
    WriteSingleCoil = 0x05,
    /// Write Single Register (0x06)
    WriteSingleRegister = 0x06,
    /// Read Exception Status (0x07)
    ReadExceptionStatus = 0x07,
    /// Diagnostics (0x08)
    Diagnostics = 0x08,
    /// Get Comm Event Counter (0x0B)
    GetCommEventCounter = 0x0B,
    /// Get Comm Event Log (0x0C)
    GetCommEventLog = 0x0C,
    /// Write Multiple Coils (0x0F)
    WriteMultipleCoils = 0x0F,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = 0x10,
    /// Report Server ID (0x11)
    ReportServerId = 0x11,
    /// Mask Write Register (0x16)
    MaskWriteRegister = 0x16,
    /// Read/Write Multiple Registers (0x17)
    ReadWriteMultipleRegisters = 0x17,
    /// Read FIFO Queue (0x18)
    ReadFifoQueue = 0x18,
    /// Encapsulated Interface Transport (0x2B)
    EncapsulatedInterfaceTransport = 0x2B,
}

impl ModbusFunction {
    /// Convert from u8 to ModbusFunction
    pub fn from_u8(value: u8) -> Option<Self> {
        let function = match value {
            0x01 => ModbusFunction::ReadCoils,
            0x02 => ModbusFunction::ReadDiscreteInputs,
            0x03 => ModbusFunction::ReadHoldingRegisters,
            0x04 => ModbusFunction::ReadInputRegisters,
            0x05 => ModbusFunction::WriteSingleCoil,
            0x06 => ModbusFunction::WriteSingleRegister,
            0x07 => ModbusFunction::ReadExceptionStatus,
            0x08 => ModbusFunction::Diagnostics,
            0x0B => ModbusFunction::GetCommEventCounter,
            0x0C => ModbusFunction::GetCommEventLog,
            0x0F => ModbusFunction::WriteMultipleCoils,
            0x10 => ModbusFunction::WriteMultipleRegisters,
            0x11 => ModbusFunction::ReportServerId,
            0x16 => ModbusFunction::MaskWriteRegister,
            0x17 => ModbusFunction::ReadWriteMultipleRegisters,
            0x18 => ModbusFunction::ReadFifoQueue,
            0x2B => ModbusFunction::EncapsulatedInterfaceTransport,
            _ => return None,
        };
        Some(function)
    }

    /// Convert to u8
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Function code a device uses when rejecting this function
    #[inline]
    pub fn exception_code(self) -> u8 {
        self.to_u8() | EXCEPTION_FLAG
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            ModbusFunction::ReadCoils => "Read Coils",
            ModbusFunction::ReadDiscreteInputs => "Read Discrete Inputs",
            ModbusFunction::ReadHoldingRegisters => "Read Holding Registers",
            ModbusFunction::ReadInputRegisters => "Read Input Registers",
            ModbusFunction::WriteSingleCoil => "Write Single Coil",
            ModbusFunction::WriteSingleRegister => "Write Single Register",
            ModbusFunction::ReadExceptionStatus => "Read Exception Status",
            ModbusFunction::Diagnostics => "Diagnostics",
            ModbusFunction::GetCommEventCounter => "Get Comm Event Counter",
            ModbusFunction::GetCommEventLog => "Get Comm Event Log",
            ModbusFunction::WriteMultipleCoils => "Write Multiple Coils",
            ModbusFunction::WriteMultipleRegisters => "Write Multiple Registers",
            ModbusFunction::ReportServerId => "Report Server ID",
            ModbusFunction::MaskWriteRegister => "Mask Write Register",
            ModbusFunction::ReadWriteMultipleRegisters => "Read/Write Multiple Registers",
            ModbusFunction::ReadFifoQueue => "Read FIFO Queue",
            ModbusFunction::EncapsulatedInterfaceTransport => "Encapsulated Interface Transport",
        }
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), *self as u8)
    }
}

/// Modbus exception codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModbusException {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDeviceFailedToRespond = 0x0B,
}

impl ModbusException {
    /// Convert from u8 to ModbusException
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            EXCEPTION_ILLEGAL_FUNCTION => Some(ModbusException::IllegalFunction),
            EXCEPTION_ILLEGAL_DATA_ADDRESS => Some(ModbusException::IllegalDataAddress),
            EXCEPTION_ILLEGAL_DATA_VALUE => Some(ModbusException::IllegalDataValue),
            EXCEPTION_SERVER_DEVICE_FAILURE => Some(ModbusException::ServerDeviceFailure),
            EXCEPTION_ACKNOWLEDGE => Some(ModbusException::Acknowledge),
            EXCEPTION_SERVER_DEVICE_BUSY => Some(ModbusException::ServerDeviceBusy),
            EXCEPTION_MEMORY_PARITY_ERROR => Some(ModbusException::MemoryParityError),
            EXCEPTION_GATEWAY_PATH_UNAVAILABLE => Some(ModbusException::GatewayPathUnavailable),
            EXCEPTION_GATEWAY_TARGET_FAILED => Some(ModbusException::GatewayTargetDeviceFailedToRespond),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Short name, as used in error messages
    pub fn name(self) -> &'static str {
        match self {
            ModbusException::IllegalFunction => "Illegal Function",
            ModbusException::IllegalDataAddress => "Illegal Data Address",
            ModbusException::IllegalDataValue => "Illegal Data Value",
            ModbusException::ServerDeviceFailure => "Server Device Failure",
            ModbusException::Acknowledge => "Acknowledge",
            ModbusException::ServerDeviceBusy => "Server Device Busy",
            ModbusException::MemoryParityError => "Memory Parity Error",
            ModbusException::GatewayPathUnavailable => "Gateway Path Unavailable",
            ModbusException::GatewayTargetDeviceFailedToRespond => {
                "Gateway Target Device Failed to Respond"
            }
        }
    }
}

impl fmt::Display for ModbusException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modbus Exception 0x{:02X}: {}", self.to_u8(), self.name())
    }
}

/// Diagnostics (0x08) sub-function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DiagnosticSubFunction {
    ReturnQueryData = 0x00,
    RestartCommunicationsOption = 0x01,
    ReturnDiagnosticRegister = 0x02,
    ChangeAsciiInputDelimiter = 0x03,
    ForceListenOnlyMode = 0x04,
    ClearCountersAndDiagnosticRegister = 0x0A,
    ReturnBusMessageCount = 0x0B,
    ReturnBusCommunicationErrorCount = 0x0C,
    ReturnBusExceptionErrorCount = 0x0D,
    ReturnServerMessageCount = 0x0E,
    ReturnServerNoResponseCount = 0x0F,
    ReturnServerNakCount = 0x10,
    ReturnServerBusyCount = 0x11,
    ReturnBusCharacterOverrunCount = 0x12,
    ClearOverrunCounterAndFlag = 0x14,
}

impl DiagnosticSubFunction {
    /// Convert to the wire value
    #[inline]
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Whether the device is still busy with the previous command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommStatus {
    /// Status word 0xFFFF
    StillProcessing,
    /// Status word 0x0000
    Complete,
}

impl CommStatus {
    /// Decode the 16-bit status word of FC11/FC12 responses
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0xFFFF => Some(CommStatus::StillProcessing),
            0x0000 => Some(CommStatus::Complete),
            _ => None,
        }
    }
}

/// Result of Get Comm Event Counter (0x0B)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommEventCounter {
    pub status: CommStatus,
    pub event_count: u16,
}

/// One entry of the comm event log (0x0C)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommEvent {
    /// Device received a message (bit 7 set)
    Receive {
        communication_error: bool,
        character_overrun: bool,
        listen_only_mode: bool,
        broadcast_received: bool,
    },
    /// Device sent a response (bit 7 clear, bit 6 set)
    Send {
        read_exception_sent: bool,
        server_abort_exception_sent: bool,
        server_busy_exception_sent: bool,
        server_program_nak_exception_sent: bool,
        write_timeout_error: bool,
        listen_only_mode: bool,
    },
    /// Device entered listen only mode (0x04)
    EnteredListenOnlyMode,
    /// Device restarted communications (0x00)
    CommunicationRestart,
}

impl CommEvent {
    /// Decode one event byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        let bit = |n: u8| byte & (1 << n) != 0;

        if bit(7) {
            Some(CommEvent::Receive {
                communication_error: bit(1),
                character_overrun: bit(4),
                listen_only_mode: bit(5),
                broadcast_received: bit(6),
            })
        } else if bit(6) {
            Some(CommEvent::Send {
                read_exception_sent: bit(0),
                server_abort_exception_sent: bit(1),
                server_busy_exception_sent: bit(2),
                server_program_nak_exception_sent: bit(3),
                write_timeout_error: bit(4),
                listen_only_mode: bit(5),
            })
        } else {
            match byte {
                0x04 => Some(CommEvent::EnteredListenOnlyMode),
                0x00 => Some(CommEvent::CommunicationRestart),
                _ => None,
            }
        }
    }
}

/// Result of Get Comm Event Log (0x0C)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommEventLog {
    pub status: CommStatus,
    pub event_count: u16,
    pub message_count: u16,
    /// Most recent event first
    pub events: Vec<CommEvent>,
}

/// Result of Report Server ID (0x11)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerId {
    pub server_id: Vec<u8>,
    pub run_indicator: bool,
    pub additional_data: Vec<u8>,
}

impl ServerId {
    /// Split a Report Server ID payload (after the byte count).
    ///
    /// The server id length is device specific and must be supplied.
    pub fn parse(payload: &[u8], server_id_len: usize) -> ModbusResult<Self> {
        let needed = server_id_len.checked_add(1);
        if needed.is_none_or(|needed| payload.len() < needed) {
            return Err(ModbusError::invalid_argument(format!(
                "Server ID length {} exceeds payload of {} bytes",
                server_id_len,
                payload.len()
            )));
        }

        let run_indicator = match payload[server_id_len] {
            0x00 => false,
            0xFF => true,
            other => {
                return Err(ModbusError::invalid_argument(format!(
                    "Run indicator 0x{:02X} at offset {} is neither 0x00 nor 0xFF",
                    other, server_id_len
                )))
            }
        };

        Ok(Self {
            server_id: payload[..server_id_len].to_vec(),
            run_indicator,
            additional_data: payload[server_id_len + 1..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_roundtrip() {
        for code in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x0B, 0x0C, 0x0F, 0x10] {
            let function = ModbusFunction::from_u8(code).unwrap();
            assert_eq!(function.to_u8(), code);
        }
        assert_eq!(ModbusFunction::from_u8(0x99), None);
        assert_eq!(ModbusFunction::ReadHoldingRegisters.exception_code(), 0x83);
    }

    #[test]
    fn test_function_display() {
        let text = ModbusFunction::ReadFifoQueue.to_string();
        assert_eq!(text, "Read FIFO Queue (0x18)");
    }

    #[test]
    fn test_broadcast() {
        assert!(is_broadcast(0xFF));
        assert!(!is_broadcast(0x01));
        assert!(!is_broadcast(0x00));
    }

    #[test]
    fn test_comm_event_decoding() {
        assert_eq!(CommEvent::from_byte(0x00), Some(CommEvent::CommunicationRestart));
        assert_eq!(CommEvent::from_byte(0x04), Some(CommEvent::EnteredListenOnlyMode));
        assert_eq!(
            CommEvent::from_byte(0b1100_0010),
            Some(CommEvent::Receive {
                communication_error: true,
                character_overrun: false,
                listen_only_mode: false,
                broadcast_received: true,
            })
        );
        assert_eq!(
            CommEvent::from_byte(0b0100_0101),
            Some(CommEvent::Send {
                read_exception_sent: true,
                server_abort_exception_sent: false,
                server_busy_exception_sent: true,
                server_program_nak_exception_sent: false,
                write_timeout_error: false,
                listen_only_mode: false,
            })
        );
        assert_eq!(CommEvent::from_byte(0x01), None);
    }

    #[test]
    fn test_server_id_parse() {
        let parsed = ServerId::parse(&[0x42, 0x43, 0xFF, 0x01], 2).unwrap();
        assert_eq!(parsed.server_id, vec![0x42, 0x43]);
        assert!(parsed.run_indicator);
        assert_eq!(parsed.additional_data, vec![0x01]);

        assert!(ServerId::parse(&[0x42, 0x17], 1).is_err());
        assert!(ServerId::parse(&[0x42], 1).is_err());
        assert!(ServerId::parse(&[0x42, 0xFF], usize::MAX).is_err());
    }

    #[test]
    fn test_exception_codes_match_constants() {
        assert_eq!(
            ModbusException::from_u8(EXCEPTION_ILLEGAL_DATA_ADDRESS),
            Some(ModbusException::IllegalDataAddress)
        );
        assert_eq!(
            ModbusException::from_u8(EXCEPTION_GATEWAY_TARGET_FAILED),
            Some(ModbusException::GatewayTargetDeviceFailedToRespond)
        );
        assert_eq!(ModbusException::from_u8(0x07), None);
    }

    #[test]
    fn test_comm_status() {
        assert_eq!(CommStatus::from_u16(0xFFFF), Some(CommStatus::StillProcessing));
        assert_eq!(CommStatus::from_u16(0x0000), Some(CommStatus::Complete));
        assert_eq!(CommStatus::from_u16(0x1234), None);
    }
}
