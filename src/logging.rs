//! Callback-based request/response logging for the client.
//!
//! Library diagnostics go through `tracing`; [`CallbackLogger`] is the
//! user-facing hook that reports every exchange a client performs.

use std::sync::Arc;

use crate::frame::encode_frame;
use crate::pdu::ModbusPdu;
use crate::protocol::{ModbusException, ModbusFunction, UnitId};
use crate::transport::format_hex_packet;

/// Log levels for the callback logging system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Error messages
    Error,
    /// Warning messages
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
}

impl LogLevel {
    /// Convert log level to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Logging mode for packet display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Show the ASCII frame as sent on the wire
    Raw,
    /// Show decoded fields
    Interpreted,
    /// Interpreted at the message level, raw at debug level
    Both,
}

/// Type alias for log callback functions
///
/// The callback receives a log level and message string
pub type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Logger that uses callbacks for flexible logging
#[derive(Clone)]
pub struct CallbackLogger {
    callback: Option<Arc<LogCallback>>,
    min_level: LogLevel,
    mode: LoggingMode,
}

impl CallbackLogger {
    /// Create a new callback logger
    pub fn new(callback: Option<LogCallback>, min_level: LogLevel) -> Self {
        Self::with_mode(callback, min_level, LoggingMode::Interpreted)
    }

    /// Create a new callback logger with specific mode
    pub fn with_mode(
        callback: Option<LogCallback>,
        min_level: LogLevel,
        mode: LoggingMode,
    ) -> Self {
        Self {
            callback: callback.map(Arc::new),
            min_level,
            mode,
        }
    }

    /// Create a logger with default console output
    pub fn console() -> Self {
        let callback: LogCallback = Box::new(|level, message| {
            let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
            match level {
                LogLevel::Error | LogLevel::Warn => {
                    eprintln!("[{}] {}: {}", timestamp, level.as_str(), message)
                }
                LogLevel::Info | LogLevel::Debug => {
                    println!("[{}] {}: {}", timestamp, level.as_str(), message)
                }
            }
        });
        Self::new(Some(callback), LogLevel::Info)
    }

    /// Create a logger that outputs nothing (disabled)
    pub fn disabled() -> Self {
        Self::new(None, LogLevel::Error)
    }

    /// Set logging mode
    pub fn set_mode(&mut self, mode: LoggingMode) {
        self.mode = mode;
    }

    /// Get current logging mode
    pub fn get_mode(&self) -> LoggingMode {
        self.mode
    }

    /// Log a message at the specified level
    pub fn log(&self, level: LogLevel, message: &str) {
        if self.should_log(level) {
            if let Some(ref callback) = self.callback {
                callback(level, message);
            }
        }
    }

    /// Log an error message
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Log a warning message
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Log an info message
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Log a debug message
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn should_log(&self, level: LogLevel) -> bool {
        self.callback.is_some() && level as u8 <= self.min_level as u8
    }

    /// Log an outgoing request PDU
    pub fn log_request(&self, unit_id: UnitId, request: &ModbusPdu) {
        self.log_exchange("Request ->", unit_id, request, interpret_request(request));
    }

    /// Log a received response PDU
    pub fn log_response(&self, unit_id: UnitId, response: &ModbusPdu) {
        self.log_exchange("Response <-", unit_id, response, interpret_response(response));
    }

    fn log_exchange(&self, direction: &str, unit_id: UnitId, pdu: &ModbusPdu, details: String) {
        let raw = || {
            let frame = encode_frame(unit_id, pdu.as_slice());
            format!(
                "Modbus {} Raw: {}",
                direction,
                String::from_utf8_lossy(&frame).trim_end()
            )
        };
        let interpreted = || {
            format!(
                "Modbus {} Unit: {}, Function: {}, {}",
                direction,
                unit_id,
                describe_function(pdu.function_code()),
                details
            )
        };

        match self.mode {
            LoggingMode::Raw => self.info(&raw()),
            LoggingMode::Interpreted => self.info(&interpreted()),
            LoggingMode::Both => {
                self.info(&interpreted());
                self.debug(&raw());
            }
        }
    }
}

impl Default for CallbackLogger {
    fn default() -> Self {
        Self::console()
    }
}

fn describe_function(fc: Option<u8>) -> String {
    match fc {
        Some(fc) => match ModbusFunction::from_u8(fc & 0x7F) {
            Some(function) if fc & 0x80 == 0 => function.to_string(),
            Some(function) => format!("{} exception (0x{:02X})", function.name(), fc),
            None => format!("Unknown (0x{:02X})", fc),
        },
        None => "None".to_string(),
    }
}

fn interpret_request(pdu: &ModbusPdu) -> String {
    match pdu.function_code() {
        Some(0x01..=0x06) => match (pdu.u16_at(1), pdu.u16_at(3)) {
            (Some(address), Some(value)) => format!("Address: {}, Value: {}", address, value),
            _ => format!("Data: {}", format_hex_packet(pdu.as_slice())),
        },
        Some(0x0F) | Some(0x10) => match (pdu.u16_at(1), pdu.u16_at(3)) {
            (Some(address), Some(quantity)) => {
                format!("Address: {}, Quantity: {}", address, quantity)
            }
            _ => format!("Data: {}", format_hex_packet(pdu.as_slice())),
        },
        Some(0x08) => match pdu.u16_at(1) {
            Some(sub) => format!("Sub-function: 0x{:04X}", sub),
            None => "Sub-function: missing".to_string(),
        },
        _ => format!("Data: {}", format_hex_packet(&pdu.as_slice()[1.min(pdu.len())..])),
    }
}

fn interpret_response(pdu: &ModbusPdu) -> String {
    if let Some(code) = pdu.exception_code() {
        return match ModbusException::from_u8(code) {
            Some(exception) => format!("Exception: {}", exception),
            None => format!("Exception: Unknown (0x{:02X})", code),
        };
    }

    let data = &pdu.as_slice()[1.min(pdu.len())..];
    match pdu.function_code() {
        Some(0x01) | Some(0x02) | Some(0x03) | Some(0x04) if !data.is_empty() => {
            format!("Byte count: {}, Data: {}", data[0], format_hex_packet(&data[1..]))
        }
        _ => format!("Data: {}", format_hex_packet(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn capture(mode: LoggingMode, level: LogLevel) -> (CallbackLogger, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let callback: LogCallback = Box::new(move |level, message| {
            sink.lock()
                .unwrap()
                .push(format!("{}: {}", level.as_str(), message));
        });
        (CallbackLogger::with_mode(Some(callback), level, mode), lines)
    }

    #[test]
    fn test_level_filtering() {
        let (logger, lines) = capture(LoggingMode::Interpreted, LogLevel::Warn);
        logger.error("e");
        logger.warn("w");
        logger.info("i");
        logger.debug("d");
        assert_eq!(*lines.lock().unwrap(), vec!["ERROR: e", "WARN: w"]);
    }

    #[test]
    fn test_disabled_logger() {
        let logger = CallbackLogger::disabled();
        logger.error("nothing happens");
        assert!(!logger.should_log(LogLevel::Error));
    }

    #[test]
    fn test_raw_request_shows_ascii_frame() {
        let (logger, lines) = capture(LoggingMode::Raw, LogLevel::Info);
        let pdu = ModbusPdu::from_slice(&[0x03, 0x00, 0x00, 0x00, 0x02]).unwrap();
        logger.log_request(1, &pdu);
        assert_eq!(
            *lines.lock().unwrap(),
            vec!["INFO: Modbus Request -> Raw: :010300000002FA"]
        );
    }

    #[test]
    fn test_interpreted_response() {
        let (logger, lines) = capture(LoggingMode::Interpreted, LogLevel::Info);
        let pdu = ModbusPdu::from_slice(&[0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B]).unwrap();
        logger.log_response(1, &pdu);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Unit: 1"));
        assert!(lines[0].contains("Read Holding Registers (0x03)"));
        assert!(lines[0].contains("Byte count: 4, Data: 00 0A 00 0B"));
    }

    #[test]
    fn test_exception_response() {
        let (logger, lines) = capture(LoggingMode::Both, LogLevel::Debug);
        let pdu = ModbusPdu::from_slice(&[0x83, 0x02]).unwrap();
        logger.log_response(7, &pdu);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("exception (0x83)"));
        assert!(lines[0].contains("Illegal Data Address"));
        assert!(lines[1].starts_with("DEBUG: Modbus Response <- Raw: :0783"));
    }
}
