//! High-level Modbus master client
//!
//! # Architecture
//!
//! A client is a composition of three layers, each behind its own trait:
//!
//! ```text
//! GenericModbusClient  (PDU building and response validation)
//!        |
//!   FrameCodec         (ASCII framing, LRC, receive deadline)
//!        |
//!   ModbusTransport    (bytes over TCP or a serial line)
//! ```
//!
//! The application layer is written once against [`FrameCodec`], so a
//! different framing or byte channel plugs in without touching it.
//!
//! # API Naming Convention
//!
//! This library provides a **dual-track API**:
//!
//! | Function Code | Primary Name | Semantic Alias |
//! |---------------|--------------|----------------|
//! | 0x01 | `read_01()` | `read_coils()` |
//! | 0x02 | `read_02()` | `read_discrete_inputs()` |
//! | 0x03 | `read_03()` | `read_holding_registers()` |
//! | 0x04 | `read_04()` | `read_input_registers()` |
//! | 0x05 | `write_05()` | `write_single_coil()` |
//! | 0x06 | `write_06()` | `write_single_register()` |
//! | 0x07 | `read_07()` | `read_exception_status()` |
//! | 0x0B | `get_comm_event_counter_0b()` | `get_comm_event_counter()` |
//! | 0x0C | `get_comm_event_log_0c()` | `get_comm_event_log()` |
//! | 0x0F | `write_0f()` | `write_multiple_coils()` |
//! | 0x10 | `write_10()` | `write_multiple_registers()` |
//! | 0x11 | `report_server_id_11()` | `report_server_id()` |
//! | 0x16 | `mask_write_16()` | `mask_write_register()` |
//! | 0x17 | `read_write_17()` | `read_write_multiple_registers()` |
//! | 0x18 | `read_fifo_18()` | `read_fifo_queue()` |
//! | 0x2B | `encapsulated_2b()` | `encapsulated_interface_transport()` |
//!
//! Diagnostics (0x08) live on [`GenericModbusClient`] directly, see
//! [`crate::diagnostics`].
//!
//! # Broadcast
//!
//! Unit id 0xFF addresses every device and is never answered. Writes sent to
//! it return as soon as the frame is out; reads fail with
//! [`ModbusError::InvalidArgument`] before anything is sent.
//!
//! # Quick Start
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
//!     // Read 10 holding registers from unit 1, starting at address 0
//!     let registers = client.read_03(1, 0, 10).await?;
//!     println!("Registers: {:?}", registers);
//!
//!     client.write_06(1, 100, 0x1234).await?;
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::debug;

use crate::config::MasterConfig;
use crate::constants::{MAX_COMM_EVENTS, MAX_FIFO_COUNT, MAX_PDU_SIZE};
use crate::error::{ModbusError, ModbusResult};
use crate::frame::{AsciiFrameCodec, FrameCodec};
use crate::logging::CallbackLogger;
use crate::pdu::{
    check_exception, decode_registers, expect_echo, expect_function, expect_len, mismatch,
    unpack_bits, ModbusPdu, PduBuilder,
};
use crate::protocol::{
    is_broadcast, CommEvent, CommEventCounter, CommEventLog, CommStatus, ModbusFunction,
    ServerId, UnitId,
};
use crate::transport::{TcpTransport, TransportStats};

#[cfg(feature = "serial")]
use crate::transport::SerialTransport;

/// Interface for Modbus master operations.
///
/// Every method validates its arguments before any I/O, so an
/// [`ModbusError::InvalidArgument`] guarantees nothing was sent.
///
/// # Protocol Limits
///
/// | Operation | Limit |
/// |-----------|-------|
/// | Read Coils (0x01) | 2000 coils |
/// | Read Discrete Inputs (0x02) | 2000 bits |
/// | Read Holding Registers (0x03) | 125 registers |
/// | Read Input Registers (0x04) | 125 registers |
/// | Write Multiple Coils (0x0F) | 1968 coils |
/// | Write Multiple Registers (0x10) | 123 registers |
/// | Read/Write Multiple Registers (0x17) | 125 read, 121 written |
/// | Read FIFO Queue (0x18) | 31 values |
pub trait ModbusClient: Send {
    /// Read coils (function code 0x01).
    ///
    /// # Arguments
    ///
    /// * `unit_id` - Target unit, must not be broadcast
    /// * `address` - Starting coil address (0-65535)
    /// * `quantity` - Number of coils to read (1-2000)
    ///
    /// # Returns
    ///
    /// Exactly `quantity` coil states.
    fn read_01(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read discrete inputs (function code 0x02).
    ///
    /// * `quantity` - Number of inputs to read (1-2000)
    fn read_02(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read holding registers (function code 0x03).
    ///
    /// # Arguments
    ///
    /// * `unit_id` - Target unit, must not be broadcast
    /// * `address` - Starting register address (0-65535)
    /// * `quantity` - Number of registers to read (1-125)
    ///
    /// # Returns
    ///
    /// Exactly `quantity` register values.
    fn read_03(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Read input registers (function code 0x04).
    ///
    /// * `quantity` - Number of registers to read (1-125)
    fn read_04(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Write a single coil (function code 0x05).
    ///
    /// The device must echo the request exactly.
    fn write_05(
        &mut self,
        unit_id: UnitId,
        address: u16,
        value: bool,
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write a single register (function code 0x06).
    ///
    /// The device must echo the request exactly.
    fn write_06(
        &mut self,
        unit_id: UnitId,
        address: u16,
        value: u16,
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Read the eight exception status outputs (function code 0x07).
    fn read_07(&mut self, unit_id: UnitId) -> impl Future<Output = ModbusResult<u8>> + Send;

    /// Get comm event counter (function code 0x0B).
    fn get_comm_event_counter_0b(
        &mut self,
        unit_id: UnitId,
    ) -> impl Future<Output = ModbusResult<CommEventCounter>> + Send;

    /// Get comm event log (function code 0x0C).
    fn get_comm_event_log_0c(
        &mut self,
        unit_id: UnitId,
    ) -> impl Future<Output = ModbusResult<CommEventLog>> + Send;

    /// Write multiple coils (function code 0x0F).
    ///
    /// * `values` - 1-1968 coil states
    fn write_0f(
        &mut self,
        unit_id: UnitId,
        address: u16,
        values: &[bool],
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write multiple registers (function code 0x10).
    ///
    /// * `values` - 1-123 register values
    fn write_10(
        &mut self,
        unit_id: UnitId,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Report server ID (function code 0x11).
    ///
    /// The length of the server id field is device specific, so the caller
    /// supplies it as `server_id_len`.
    fn report_server_id_11(
        &mut self,
        unit_id: UnitId,
        server_id_len: usize,
    ) -> impl Future<Output = ModbusResult<ServerId>> + Send;

    /// Mask write register (function code 0x16).
    ///
    /// Result = (current AND `and_mask`) OR (`or_mask` AND NOT `and_mask`).
    fn mask_write_16(
        &mut self,
        unit_id: UnitId,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write then read registers in one transaction (function code 0x17).
    ///
    /// # Arguments
    ///
    /// * `read_address` / `read_quantity` - Registers to read back (1-125)
    /// * `write_address` / `values` - Registers to write first (1-121)
    fn read_write_17(
        &mut self,
        unit_id: UnitId,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Read FIFO queue (function code 0x18).
    fn read_fifo_18(
        &mut self,
        unit_id: UnitId,
        fifo_address: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Encapsulated interface transport (function code 0x2B).
    ///
    /// Returns the response bytes after the echoed MEI type.
    fn encapsulated_2b(
        &mut self,
        unit_id: UnitId,
        mei_type: u8,
        data: &[u8],
    ) -> impl Future<Output = ModbusResult<Vec<u8>>> + Send;

    /// Check if the client is connected.
    fn is_connected(&self) -> bool;

    /// Close the client connection.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Get transport statistics.
    fn get_stats(&self) -> TransportStats;

    // ===== Semantic name aliases (for readability) =====

    /// Alias for `read_01` - Read coils
    #[inline]
    fn read_coils(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send {
        self.read_01(unit_id, address, quantity)
    }

    /// Alias for `read_02` - Read discrete inputs
    #[inline]
    fn read_discrete_inputs(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send {
        self.read_02(unit_id, address, quantity)
    }

    /// Alias for `read_03` - Read holding registers
    #[inline]
    fn read_holding_registers(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_03(unit_id, address, quantity)
    }

    /// Alias for `read_04` - Read input registers
    #[inline]
    fn read_input_registers(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_04(unit_id, address, quantity)
    }

    /// Alias for `write_05` - Write single coil
    #[inline]
    fn write_single_coil(
        &mut self,
        unit_id: UnitId,
        address: u16,
        value: bool,
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_05(unit_id, address, value)
    }

    /// Alias for `write_06` - Write single register
    #[inline]
    fn write_single_register(
        &mut self,
        unit_id: UnitId,
        address: u16,
        value: u16,
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_06(unit_id, address, value)
    }

    /// Alias for `read_07` - Read exception status
    #[inline]
    fn read_exception_status(
        &mut self,
        unit_id: UnitId,
    ) -> impl Future<Output = ModbusResult<u8>> + Send {
        self.read_07(unit_id)
    }

    /// Alias for `get_comm_event_counter_0b`
    #[inline]
    fn get_comm_event_counter(
        &mut self,
        unit_id: UnitId,
    ) -> impl Future<Output = ModbusResult<CommEventCounter>> + Send {
        self.get_comm_event_counter_0b(unit_id)
    }

    /// Alias for `get_comm_event_log_0c`
    #[inline]
    fn get_comm_event_log(
        &mut self,
        unit_id: UnitId,
    ) -> impl Future<Output = ModbusResult<CommEventLog>> + Send {
        self.get_comm_event_log_0c(unit_id)
    }

    /// Alias for `write_0f` - Write multiple coils
    #[inline]
    fn write_multiple_coils(
        &mut self,
        unit_id: UnitId,
        address: u16,
        values: &[bool],
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_0f(unit_id, address, values)
    }

    /// Alias for `write_10` - Write multiple registers
    #[inline]
    fn write_multiple_registers(
        &mut self,
        unit_id: UnitId,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_10(unit_id, address, values)
    }

    /// Alias for `report_server_id_11`
    #[inline]
    fn report_server_id(
        &mut self,
        unit_id: UnitId,
        server_id_len: usize,
    ) -> impl Future<Output = ModbusResult<ServerId>> + Send {
        self.report_server_id_11(unit_id, server_id_len)
    }

    /// Alias for `mask_write_16` - Mask write register
    #[inline]
    fn mask_write_register(
        &mut self,
        unit_id: UnitId,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.mask_write_16(unit_id, address, and_mask, or_mask)
    }

    /// Alias for `read_write_17` - Read/write multiple registers
    #[inline]
    fn read_write_multiple_registers(
        &mut self,
        unit_id: UnitId,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_write_17(unit_id, read_address, read_quantity, write_address, values)
    }

    /// Alias for `read_fifo_18` - Read FIFO queue
    #[inline]
    fn read_fifo_queue(
        &mut self,
        unit_id: UnitId,
        fifo_address: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_fifo_18(unit_id, fifo_address)
    }

    /// Alias for `encapsulated_2b`
    #[inline]
    fn encapsulated_interface_transport(
        &mut self,
        unit_id: UnitId,
        mei_type: u8,
        data: &[u8],
    ) -> impl Future<Output = ModbusResult<Vec<u8>>> + Send {
        self.encapsulated_2b(unit_id, mei_type, data)
    }
}

/// Fail with `InvalidArgument` if a data-returning request targets broadcast
pub(crate) fn reject_broadcast(unit_id: UnitId, function: ModbusFunction) -> ModbusResult<()> {
    if is_broadcast(unit_id) {
        return Err(ModbusError::invalid_argument(format!(
            "{} cannot be broadcast: unit {} never responds",
            function, unit_id
        )));
    }
    Ok(())
}

/// Generic Modbus master over any frame codec
///
/// Holds one connection and performs one request at a time. Share it
/// between tasks behind a mutex.
pub struct GenericModbusClient<F: FrameCodec> {
    frame: F,
    logger: Option<CallbackLogger>,
}

impl<F: FrameCodec> GenericModbusClient<F> {
    /// Create a new client over the given frame codec
    pub fn new(frame: F) -> Self {
        Self {
            frame,
            logger: None,
        }
    }

    /// Create a new client with request/response logging
    pub fn with_logger(frame: F, logger: CallbackLogger) -> Self {
        Self {
            frame,
            logger: Some(logger),
        }
    }

    /// Attach or remove the request/response logger
    pub fn set_logger(&mut self, logger: Option<CallbackLogger>) {
        self.logger = logger;
    }

    /// Get a reference to the frame codec
    pub fn frame(&self) -> &F {
        &self.frame
    }

    /// Get a mutable reference to the frame codec
    pub fn frame_mut(&mut self) -> &mut F {
        &mut self.frame
    }

    /// Send a request and return the response PDU.
    ///
    /// Exception responses are turned into [`ModbusError::Exception`];
    /// any other shape check is left to the caller.
    pub async fn execute_request(
        &mut self,
        unit_id: UnitId,
        request: &ModbusPdu,
    ) -> ModbusResult<ModbusPdu> {
        if let Some(ref logger) = self.logger {
            logger.log_request(unit_id, request);
        }

        let response = self.frame.exchange(unit_id, request).await?;

        if let Some(ref logger) = self.logger {
            logger.log_response(unit_id, &response);
        }

        check_exception(request, &response)?;
        Ok(response)
    }

    /// Send a request without waiting for a response
    pub async fn send_request(&mut self, unit_id: UnitId, request: &ModbusPdu) -> ModbusResult<()> {
        if let Some(ref logger) = self.logger {
            logger.log_request(unit_id, request);
        }
        self.frame.send_only(unit_id, request).await
    }

    /// Send a write request; broadcast returns once sent, otherwise the
    /// response PDU is returned for validation.
    async fn execute_write(
        &mut self,
        unit_id: UnitId,
        request: &ModbusPdu,
    ) -> ModbusResult<Option<ModbusPdu>> {
        if is_broadcast(unit_id) {
            debug!(
                "Broadcasting {}",
                ModbusPdu::function_code_description(request.function_code().unwrap_or(0))
            );
            self.send_request(unit_id, request).await?;
            return Ok(None);
        }
        self.execute_request(unit_id, request).await.map(Some)
    }

    async fn read_bits(
        &mut self,
        unit_id: UnitId,
        function: ModbusFunction,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        reject_broadcast(unit_id, function)?;
        let request = PduBuilder::build_read_request(function.to_u8(), address, quantity)?;
        let response = self.execute_request(unit_id, &request).await?;

        let byte_count = (quantity as usize).div_ceil(8);
        check_byte_counted(&request, &response, byte_count)?;
        Ok(unpack_bits(&response.as_slice()[2..], quantity as usize))
    }

    async fn read_registers(
        &mut self,
        unit_id: UnitId,
        function: ModbusFunction,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        reject_broadcast(unit_id, function)?;
        let request = PduBuilder::build_read_request(function.to_u8(), address, quantity)?;
        let response = self.execute_request(unit_id, &request).await?;

        check_byte_counted(&request, &response, quantity as usize * 2)?;
        Ok(decode_registers(&response.as_slice()[2..]))
    }
}

/// Validate a `[fc, byte_count, data..]` response with a known byte count
fn check_byte_counted(
    request: &ModbusPdu,
    response: &ModbusPdu,
    byte_count: usize,
) -> ModbusResult<()> {
    expect_function(request, response)?;
    expect_len(request, response, 2 + byte_count)?;
    if response.as_slice()[1] as usize != byte_count {
        return Err(mismatch(
            &format!(
                "Byte count {} does not match expected {}",
                response.as_slice()[1],
                byte_count
            ),
            request,
            response,
        ));
    }
    Ok(())
}

/// Validate that the first five bytes of `response` repeat the request
fn check_write_multiple_echo(request: &ModbusPdu, response: &ModbusPdu) -> ModbusResult<()> {
    expect_len(request, response, 5)?;
    if response.as_slice() != &request.as_slice()[..5] {
        return Err(mismatch(
            "Response does not echo address and quantity",
            request,
            response,
        ));
    }
    Ok(())
}

impl<F: FrameCodec> ModbusClient for GenericModbusClient<F> {
    async fn read_01(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(unit_id, ModbusFunction::ReadCoils, address, quantity)
            .await
    }

    async fn read_02(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(unit_id, ModbusFunction::ReadDiscreteInputs, address, quantity)
            .await
    }

    async fn read_03(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_registers(unit_id, ModbusFunction::ReadHoldingRegisters, address, quantity)
            .await
    }

    async fn read_04(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_registers(unit_id, ModbusFunction::ReadInputRegisters, address, quantity)
            .await
    }

    async fn write_05(&mut self, unit_id: UnitId, address: u16, value: bool) -> ModbusResult<()> {
        let request = PduBuilder::build_write_single_coil(address, value)?;
        if let Some(response) = self.execute_write(unit_id, &request).await? {
            expect_echo(&request, &response)?;
        }
        Ok(())
    }

    async fn write_06(&mut self, unit_id: UnitId, address: u16, value: u16) -> ModbusResult<()> {
        let request = PduBuilder::build_write_single_register(address, value)?;
        if let Some(response) = self.execute_write(unit_id, &request).await? {
            expect_echo(&request, &response)?;
        }
        Ok(())
    }

    async fn read_07(&mut self, unit_id: UnitId) -> ModbusResult<u8> {
        reject_broadcast(unit_id, ModbusFunction::ReadExceptionStatus)?;
        let request = PduBuilder::build_read_exception_status()?;
        let response = self.execute_request(unit_id, &request).await?;

        expect_function(&request, &response)?;
        expect_len(&request, &response, 2)?;
        Ok(response.as_slice()[1])
    }

    async fn get_comm_event_counter_0b(&mut self, unit_id: UnitId) -> ModbusResult<CommEventCounter> {
        reject_broadcast(unit_id, ModbusFunction::GetCommEventCounter)?;
        let request = PduBuilder::build_get_comm_event_counter()?;
        let response = self.execute_request(unit_id, &request).await?;

        expect_function(&request, &response)?;
        expect_len(&request, &response, 5)?;

        let status = decode_status(&request, &response, 1)?;
        let event_count = response
            .u16_at(3)
            .ok_or_else(|| mismatch("Missing event count", &request, &response))?;
        Ok(CommEventCounter {
            status,
            event_count,
        })
    }

    async fn get_comm_event_log_0c(&mut self, unit_id: UnitId) -> ModbusResult<CommEventLog> {
        reject_broadcast(unit_id, ModbusFunction::GetCommEventLog)?;
        let request = PduBuilder::build_get_comm_event_log()?;
        let response = self.execute_request(unit_id, &request).await?;

        expect_function(&request, &response)?;
        let data = response.as_slice();
        if data.len() < 8 {
            return Err(mismatch("Comm event log response too short", &request, &response));
        }

        let byte_count = data[1] as usize;
        if byte_count < 6 || byte_count - 6 > MAX_COMM_EVENTS {
            return Err(mismatch(
                &format!("Invalid comm event log byte count {}", byte_count),
                &request,
                &response,
            ));
        }
        expect_len(&request, &response, 2 + byte_count)?;

        let status = decode_status(&request, &response, 2)?;
        let event_count = response
            .u16_at(4)
            .ok_or_else(|| mismatch("Missing event count", &request, &response))?;
        let message_count = response
            .u16_at(6)
            .ok_or_else(|| mismatch("Missing message count", &request, &response))?;

        let events = data[8..]
            .iter()
            .map(|&byte| {
                CommEvent::from_byte(byte).ok_or_else(|| {
                    mismatch(
                        &format!("Undefined comm event 0x{:02X}", byte),
                        &request,
                        &response,
                    )
                })
            })
            .collect::<ModbusResult<Vec<_>>>()?;

        Ok(CommEventLog {
            status,
            event_count,
            message_count,
            events,
        })
    }

    async fn write_0f(&mut self, unit_id: UnitId, address: u16, values: &[bool]) -> ModbusResult<()> {
        let request = PduBuilder::build_write_multiple_coils(address, values)?;
        if let Some(response) = self.execute_write(unit_id, &request).await? {
            check_write_multiple_echo(&request, &response)?;
        }
        Ok(())
    }

    async fn write_10(&mut self, unit_id: UnitId, address: u16, values: &[u16]) -> ModbusResult<()> {
        let request = PduBuilder::build_write_multiple_registers(address, values)?;
        if let Some(response) = self.execute_write(unit_id, &request).await? {
            check_write_multiple_echo(&request, &response)?;
        }
        Ok(())
    }

    async fn report_server_id_11(
        &mut self,
        unit_id: UnitId,
        server_id_len: usize,
    ) -> ModbusResult<ServerId> {
        reject_broadcast(unit_id, ModbusFunction::ReportServerId)?;
        // Function code, byte count and run indicator take three bytes
        if server_id_len > MAX_PDU_SIZE - 3 {
            return Err(ModbusError::invalid_argument(format!(
                "Server ID length {} exceeds {}",
                server_id_len,
                MAX_PDU_SIZE - 3
            )));
        }
        let request = PduBuilder::build_report_server_id()?;
        let response = self.execute_request(unit_id, &request).await?;

        expect_function(&request, &response)?;
        let data = response.as_slice();
        if data.len() < 2 {
            return Err(mismatch("Report server ID response too short", &request, &response));
        }
        expect_len(&request, &response, 2 + data[1] as usize)?;

        ServerId::parse(&data[2..], server_id_len)
            .map_err(|e| mismatch(&e.to_string(), &request, &response))
    }

    async fn mask_write_16(
        &mut self,
        unit_id: UnitId,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> ModbusResult<()> {
        let request = PduBuilder::build_mask_write_register(address, and_mask, or_mask)?;
        if let Some(response) = self.execute_write(unit_id, &request).await? {
            expect_echo(&request, &response)?;
        }
        Ok(())
    }

    async fn read_write_17(
        &mut self,
        unit_id: UnitId,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> ModbusResult<Vec<u16>> {
        reject_broadcast(unit_id, ModbusFunction::ReadWriteMultipleRegisters)?;
        let request = PduBuilder::build_read_write_multiple_registers(
            read_address,
            read_quantity,
            write_address,
            values,
        )?;
        let response = self.execute_request(unit_id, &request).await?;

        check_byte_counted(&request, &response, read_quantity as usize * 2)?;
        Ok(decode_registers(&response.as_slice()[2..]))
    }

    async fn read_fifo_18(&mut self, unit_id: UnitId, fifo_address: u16) -> ModbusResult<Vec<u16>> {
        reject_broadcast(unit_id, ModbusFunction::ReadFifoQueue)?;
        let request = PduBuilder::build_read_fifo_queue(fifo_address)?;
        let response = self.execute_request(unit_id, &request).await?;

        expect_function(&request, &response)?;
        let (Some(byte_count), Some(fifo_count)) = (response.u16_at(1), response.u16_at(3)) else {
            return Err(mismatch("FIFO response too short", &request, &response));
        };
        if fifo_count > MAX_FIFO_COUNT || byte_count != 2 + fifo_count * 2 {
            return Err(mismatch(
                &format!(
                    "Inconsistent FIFO byte count {} for {} values",
                    byte_count, fifo_count
                ),
                &request,
                &response,
            ));
        }
        expect_len(&request, &response, 3 + byte_count as usize)?;

        Ok(decode_registers(&response.as_slice()[5..]))
    }

    async fn encapsulated_2b(
        &mut self,
        unit_id: UnitId,
        mei_type: u8,
        data: &[u8],
    ) -> ModbusResult<Vec<u8>> {
        reject_broadcast(unit_id, ModbusFunction::EncapsulatedInterfaceTransport)?;
        let request = PduBuilder::build_encapsulated_interface_transport(mei_type, data)?;
        let response = self.execute_request(unit_id, &request).await?;

        expect_function(&request, &response)?;
        match response.as_slice() {
            [_, echoed, rest @ ..] if *echoed == mei_type => Ok(rest.to_vec()),
            _ => Err(mismatch("MEI type not echoed", &request, &response)),
        }
    }

    fn is_connected(&self) -> bool {
        self.frame.is_connected()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.frame.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.frame.get_stats()
    }
}

fn decode_status(
    request: &ModbusPdu,
    response: &ModbusPdu,
    offset: usize,
) -> ModbusResult<CommStatus> {
    let word = response
        .u16_at(offset)
        .ok_or_else(|| mismatch("Missing status word", request, response))?;
    CommStatus::from_u16(word).ok_or_else(|| {
        mismatch(
            &format!("Invalid status word 0x{:04X}", word),
            request,
            response,
        )
    })
}

/// Modbus ASCII master over TCP
pub type ModbusAsciiTcpClient = GenericModbusClient<AsciiFrameCodec<TcpTransport>>;

impl ModbusAsciiTcpClient {
    /// Connect to `addr` ("host:port") with the given response timeout
    pub async fn connect(addr: &str, timeout: Duration) -> ModbusResult<Self> {
        Self::connect_with_config(addr, &MasterConfig::new().with_timeout(timeout)).await
    }

    /// Connect using a validated [`MasterConfig`]
    pub async fn connect_with_config(addr: &str, config: &MasterConfig) -> ModbusResult<Self> {
        config.validate()?;
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| ModbusError::invalid_argument(format!("Invalid address: {}", e)))?;

        let transport = TcpTransport::with_packet_logging(addr, config.packet_logging).await?;
        Ok(Self::new(AsciiFrameCodec::new(transport, config.timeout)))
    }

    /// Get the server address
    pub fn server_address(&self) -> SocketAddr {
        self.frame().transport().address
    }

    /// Enable or disable packet logging on existing client
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.frame_mut().transport_mut().set_packet_logging(enabled);
    }
}

/// Modbus ASCII master over a serial line
#[cfg(feature = "serial")]
pub type ModbusAsciiSerialClient = GenericModbusClient<AsciiFrameCodec<SerialTransport>>;

#[cfg(feature = "serial")]
impl ModbusAsciiSerialClient {
    /// Open `port` at `baud_rate` (7E1) with the given response timeout
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> ModbusResult<Self> {
        let transport = SerialTransport::open(port, baud_rate)?;
        Ok(Self::new(AsciiFrameCodec::new(transport, timeout)))
    }
}
