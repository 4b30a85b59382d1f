//! # Modbus Master Error Handling
//!
//! Every failure in the master is one of six kinds, shared by the frame
//! layer and the PDU layer and propagated to the caller unchanged:
//!
//! | Kind | Raised by | Touches the wire? |
//! |------|-----------|-------------------|
//! | [`ModbusError::InvalidArgument`] | request builders | no |
//! | [`ModbusError::Timeout`] | frame receive loop | yes |
//! | [`ModbusError::MalformedFrame`] | ASCII frame decoding | yes |
//! | [`ModbusError::InvalidResponse`] | response validation | yes |
//! | [`ModbusError::Exception`] | device exception PDU | yes |
//! | [`ModbusError::Transport`] | byte transport | yes |
//!
//! Nothing is retried by this layer. Callers branch on the kind:
//!
//! ```rust
//! use voltage_modbus_ascii::{ModbusError, ModbusResult};
//!
//! fn handle(result: ModbusResult<Vec<u16>>) {
//!     match result {
//!         Ok(registers) => println!("Read {} registers", registers.len()),
//!         Err(ModbusError::Exception { code, message, .. }) => {
//!             println!("Device rejected request: {} ({:02X})", message, code);
//!         }
//!         Err(ModbusError::InvalidResponse { request, response, .. }) => {
//!             println!("Bad response {:02X?} to {:02X?}", response, request);
//!         }
//!         Err(error) if error.is_recoverable() => println!("Retry later: {}", error),
//!         Err(error) => println!("Fatal: {}", error),
//!     }
//! }
//! ```

use thiserror::Error;

use crate::constants::{
    STATUS_FAIL, STATUS_INVALID_ARGUMENT, STATUS_RESPONSE_ERROR, STATUS_TIMEOUT_ERROR,
    STATUS_TRANSPORT_ERROR,
};
use crate::protocol::ModbusException;

/// Result type alias for Modbus operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Modbus master error kinds
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Caller supplied arguments that cannot form a conformant request.
    ///
    /// Raised before any byte is sent.
    ///
    /// # Examples
    /// - Reading 126 holding registers (max 125)
    /// - Reading from the broadcast address
    /// - Odd-length diagnostic payload
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// No complete response arrived before the deadline.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// ASCII frame structure violation (bad character, odd length, too short).
    #[error("Malformed frame: {message}")]
    MalformedFrame { message: String },

    /// The response PDU does not match the request.
    ///
    /// Carries the request and response bytes for postmortem.
    #[error("Invalid response: {message} (request={request:02X?}, response={response:02X?})")]
    InvalidResponse {
        message: String,
        request: Vec<u8>,
        response: Vec<u8>,
    },

    /// The device answered with a valid exception PDU.
    ///
    /// # Standard Exception Codes
    /// - 0x01: Illegal Function
    /// - 0x02: Illegal Data Address
    /// - 0x03: Illegal Data Value
    /// - 0x04: Server Device Failure
    /// - 0x05: Acknowledge
    /// - 0x06: Server Device Busy
    /// - 0x08: Memory Parity Error
    /// - 0x0A: Gateway Path Unavailable
    /// - 0x0B: Gateway Target Device Failed to Respond
    #[error("Modbus exception: function={function:02X}, code={code:02X} ({message})")]
    Exception {
        function: u8,
        code: u8,
        message: String,
    },

    /// Opaque failure of the underlying byte transport.
    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl ModbusError {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a timeout error
    ///
    /// # Arguments
    ///
    /// * `operation` - Description of the operation that timed out
    /// * `timeout_ms` - Timeout duration in milliseconds
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a malformed frame error
    pub fn malformed_frame<S: Into<String>>(message: S) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Create an invalid response error carrying both byte sequences
    pub fn invalid_response<S: Into<String>>(message: S, request: &[u8], response: &[u8]) -> Self {
        Self::InvalidResponse {
            message: message.into(),
            request: request.to_vec(),
            response: response.to_vec(),
        }
    }

    /// Create a Modbus exception error
    ///
    /// Standard exception codes are mapped to human-readable messages.
    ///
    /// # Arguments
    ///
    /// * `function` - Function code of the rejected request
    /// * `code` - Modbus exception code
    pub fn exception(function: u8, code: u8) -> Self {
        let message = ModbusException::from_u8(code)
            .map(|e| e.name())
            .unwrap_or("Unknown Exception")
            .to_string();

        Self::Exception {
            function,
            code,
            message,
        }
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Exception code carried by a device exception, if any
    pub fn exception_code(&self) -> Option<u8> {
        match self {
            Self::Exception { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if retrying the same request could succeed
    ///
    /// ```rust
    /// use voltage_modbus_ascii::ModbusError;
    ///
    /// assert!(ModbusError::timeout("read response", 1000).is_recoverable());
    /// assert!(!ModbusError::invalid_argument("quantity 0").is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Timeout { .. } => true,
            // Acknowledge, Busy
            Self::Exception { code, .. } => matches!(code, 0x05 | 0x06),
            _ => false,
        }
    }

    /// Check if the error came from the byte transport or its deadline
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// Check if the error is a protocol-level issue
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. } | Self::InvalidResponse { .. } | Self::Exception { .. }
        )
    }

    /// Integer status code for flat exported-API surfaces.
    ///
    /// Device exceptions map to the negated exception code; everything else
    /// maps to a small positive constant. Success is
    /// [`STATUS_SUCCESS`](crate::constants::STATUS_SUCCESS).
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Transport { .. } => STATUS_TRANSPORT_ERROR,
            Self::Timeout { .. } => STATUS_TIMEOUT_ERROR,
            Self::MalformedFrame { .. } | Self::InvalidResponse { .. } => STATUS_RESPONSE_ERROR,
            Self::InvalidArgument { .. } => STATUS_INVALID_ARGUMENT,
            Self::Exception { code, .. } if *code != 0 => -i32::from(*code),
            Self::Exception { .. } => STATUS_FAIL,
        }
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::STATUS_SUCCESS;

    #[test]
    fn test_error_creation() {
        let err = ModbusError::timeout("read response", 5000);
        assert!(err.is_recoverable());
        assert!(err.is_transport_error());

        let err = ModbusError::exception(0x03, 0x02);
        assert!(!err.is_recoverable());
        assert!(err.is_protocol_error());
        assert_eq!(err.exception_code(), Some(0x02));
        assert!(err.to_string().contains("Illegal Data Address"));
    }

    #[test]
    fn test_unknown_exception_code_is_kept() {
        let err = ModbusError::exception(0x03, 0x42);
        assert_eq!(err.exception_code(), Some(0x42));
        assert!(err.to_string().contains("Unknown Exception"));
    }

    #[test]
    fn test_invalid_response_display() {
        let err = ModbusError::invalid_response("echo mismatch", &[0x06, 0x00], &[0x06, 0x01]);
        let msg = err.to_string();
        assert!(msg.contains("echo mismatch"));
        assert!(msg.contains("06"));
        match err {
            ModbusError::InvalidResponse { request, response, .. } => {
                assert_eq!(request, vec![0x06, 0x00]);
                assert_eq!(response, vec![0x06, 0x01]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(STATUS_SUCCESS, 0);
        assert_eq!(ModbusError::transport("reset").status_code(), 2);
        assert_eq!(ModbusError::timeout("read", 100).status_code(), 3);
        assert_eq!(ModbusError::malformed_frame("odd").status_code(), 4);
        assert_eq!(ModbusError::invalid_response("x", &[], &[]).status_code(), 4);
        assert_eq!(ModbusError::invalid_argument("x").status_code(), 5);
        assert_eq!(ModbusError::exception(0x03, 0x02).status_code(), -2);
        assert_eq!(ModbusError::exception(0x03, 0x00).status_code(), 1);
    }

    #[test]
    fn test_io_error_is_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err: ModbusError = io.into();
        assert!(matches!(err, ModbusError::Transport { .. }));
    }
}
