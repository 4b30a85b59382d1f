//! Modbus PDU data structure, request builders and response checks
//!
//! Use a fixed-size stack array to avoid heap allocation. Every builder
//! validates its arguments and fails with
//! [`ModbusError::InvalidArgument`] before anything reaches the wire.

use tracing::debug;

use crate::constants::{
    EXCEPTION_FLAG, EXCEPTION_PDU_SIZE, FC_DIAGNOSTICS, FC_ENCAPSULATED_INTERFACE_TRANSPORT,
    FC_GET_COMM_EVENT_COUNTER, FC_GET_COMM_EVENT_LOG, FC_MASK_WRITE_REGISTER,
    FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_EXCEPTION_STATUS, FC_READ_FIFO_QUEUE,
    FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS, FC_READ_WRITE_MULTIPLE_REGISTERS,
    FC_REPORT_SERVER_ID, FC_WRITE_MULTIPLE_COILS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, MAX_PDU_SIZE, MAX_READ_COILS,
    MAX_READ_REGISTERS, MAX_READ_WRITE_WRITE_REGISTERS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS,
};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::ModbusFunction;

/// PDU with stack-allocated fixed array
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    /// Fixed-size buffer (stack)
    data: [u8; MAX_PDU_SIZE],
    /// Actual data length
    len: usize,
}

impl ModbusPdu {
    /// Create an empty PDU
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    /// Create a PDU from a byte slice
    pub fn from_slice(data: &[u8]) -> ModbusResult<Self> {
        if data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::invalid_argument(format!(
                "PDU too large: {} bytes (max {})",
                data.len(),
                MAX_PDU_SIZE
            )));
        }

        let mut pdu = Self::new();
        pdu.data[..data.len()].copy_from_slice(data);
        pdu.len = data.len();

        if let Some(fc) = pdu.function_code() {
            let fc_desc = Self::function_code_description(fc);
            if pdu.is_exception() {
                debug!(
                    "PDU parsed: FC={:02X} (Exception: {}), exception_code={:02X}",
                    fc,
                    fc_desc,
                    pdu.exception_code().unwrap_or(0)
                );
            } else {
                debug!(
                    "PDU parsed: FC={:02X} ({}), data_len={}",
                    fc,
                    fc_desc,
                    pdu.len - 1
                );
            }
        } else {
            debug!("PDU parsed: empty PDU");
        }

        Ok(pdu)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> ModbusResult<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(ModbusError::invalid_argument(format!(
                "PDU exceeds max size of {} bytes",
                MAX_PDU_SIZE
            )));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> ModbusResult<()> {
        self.push((value >> 8) as u8)?;
        self.push((value & 0xFF) as u8)?;
        Ok(())
    }

    /// Extend with a byte slice
    #[inline]
    pub fn extend(&mut self, data: &[u8]) -> ModbusResult<()> {
        if self.len + data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::invalid_argument(format!(
                "PDU would exceed max size: {} + {} > {}",
                self.len,
                data.len(),
                MAX_PDU_SIZE
            )));
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    /// Get immutable data slice
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Get current length
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get function code (first byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        if self.len > 0 {
            Some(self.data[0])
        } else {
            None
        }
    }

    /// Check if the exception bit is set in the function code
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code()
            .map(|fc| fc & EXCEPTION_FLAG != 0)
            .unwrap_or(false)
    }

    /// Get exception code
    #[inline]
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() && self.len > 1 {
            Some(self.data[1])
        } else {
            None
        }
    }

    /// Read a big-endian u16 at `offset`, bounds-checked
    #[inline]
    pub fn u16_at(&self, offset: usize) -> Option<u16> {
        let bytes = self.as_slice().get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Get human-readable function code description
    pub fn function_code_description(fc: u8) -> &'static str {
        ModbusFunction::from_u8(fc & !EXCEPTION_FLAG)
            .map(ModbusFunction::name)
            .unwrap_or("Unknown Function")
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ModbusPdu {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ModbusPdu {}

/// PDU builder - fluent API
pub struct PduBuilder {
    pdu: ModbusPdu,
}

impl Default for PduBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PduBuilder {
    /// Create a new builder
    #[inline]
    pub fn new() -> Self {
        Self {
            pdu: ModbusPdu::new(),
        }
    }

    /// Set function code
    #[inline]
    pub fn function_code(mut self, fc: u8) -> ModbusResult<Self> {
        self.pdu.push(fc)?;
        Ok(self)
    }

    /// Add address
    #[inline]
    pub fn address(mut self, addr: u16) -> ModbusResult<Self> {
        self.pdu.push_u16(addr)?;
        Ok(self)
    }

    /// Add quantity
    #[inline]
    pub fn quantity(mut self, qty: u16) -> ModbusResult<Self> {
        self.pdu.push_u16(qty)?;
        Ok(self)
    }

    /// Add a big-endian word
    #[inline]
    pub fn word(mut self, value: u16) -> ModbusResult<Self> {
        self.pdu.push_u16(value)?;
        Ok(self)
    }

    /// Add a byte
    #[inline]
    pub fn byte(mut self, b: u8) -> ModbusResult<Self> {
        self.pdu.push(b)?;
        Ok(self)
    }

    /// Add data
    #[inline]
    pub fn data(mut self, data: &[u8]) -> ModbusResult<Self> {
        self.pdu.extend(data)?;
        Ok(self)
    }

    /// Build the PDU
    #[inline]
    pub fn build(self) -> ModbusPdu {
        if let Some(fc) = self.pdu.function_code() {
            debug!(
                "PDU built: FC={:02X} ({}), total_len={}",
                fc,
                ModbusPdu::function_code_description(fc),
                self.pdu.len()
            );
        } else {
            debug!("PDU built: empty PDU");
        }

        self.pdu
    }

    /// Build a read request PDU for FC01-04
    ///
    /// # Arguments
    /// * `fc` - Function code (1, 2, 3, or 4)
    /// * `start_address` - Starting address for the read operation
    /// * `quantity` - 1-2000 coils (FC01/02) or 1-125 registers (FC03/04)
    pub fn build_read_request(
        fc: u8,
        start_address: u16,
        quantity: u16,
    ) -> ModbusResult<ModbusPdu> {
        let max = match fc {
            FC_READ_COILS | FC_READ_DISCRETE_INPUTS => MAX_READ_COILS,
            FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS => MAX_READ_REGISTERS,
            _ => {
                return Err(ModbusError::invalid_argument(format!(
                    "Function code 0x{:02X} is not a read function",
                    fc
                )))
            }
        };
        check_quantity(quantity, max)?;

        PduBuilder::new()
            .function_code(fc)?
            .address(start_address)?
            .quantity(quantity)
            .map(Self::build)
    }

    /// Build a write single coil PDU (FC05)
    ///
    /// `true` is encoded as 0xFF00, `false` as 0x0000.
    pub fn build_write_single_coil(address: u16, value: bool) -> ModbusResult<ModbusPdu> {
        let coil_value: u16 = if value { 0xFF00 } else { 0x0000 };
        PduBuilder::new()
            .function_code(FC_WRITE_SINGLE_COIL)?
            .address(address)?
            .word(coil_value)
            .map(Self::build)
    }

    /// Build a write single register PDU (FC06)
    pub fn build_write_single_register(address: u16, value: u16) -> ModbusResult<ModbusPdu> {
        PduBuilder::new()
            .function_code(FC_WRITE_SINGLE_REGISTER)?
            .address(address)?
            .word(value)
            .map(Self::build)
    }

    /// Build a read exception status PDU (FC07)
    pub fn build_read_exception_status() -> ModbusResult<ModbusPdu> {
        PduBuilder::new()
            .function_code(FC_READ_EXCEPTION_STATUS)
            .map(Self::build)
    }

    /// Build a diagnostics PDU (FC08)
    ///
    /// The payload must have even length and the whole PDU must fit in
    /// 253 bytes.
    pub fn build_diagnostic(sub_function: u16, data: &[u8]) -> ModbusResult<ModbusPdu> {
        if data.len() % 2 != 0 {
            return Err(ModbusError::invalid_argument(format!(
                "Diagnostic payload length {} is odd",
                data.len()
            )));
        }
        check_pdu_size(1 + 2 + data.len())?;

        PduBuilder::new()
            .function_code(FC_DIAGNOSTICS)?
            .word(sub_function)?
            .data(data)
            .map(Self::build)
    }

    /// Build a get comm event counter PDU (FC11)
    pub fn build_get_comm_event_counter() -> ModbusResult<ModbusPdu> {
        PduBuilder::new()
            .function_code(FC_GET_COMM_EVENT_COUNTER)
            .map(Self::build)
    }

    /// Build a get comm event log PDU (FC12)
    pub fn build_get_comm_event_log() -> ModbusResult<ModbusPdu> {
        PduBuilder::new()
            .function_code(FC_GET_COMM_EVENT_LOG)
            .map(Self::build)
    }

    /// Build a write multiple coils PDU (FC15)
    ///
    /// Coils are packed LSB-first, 8 per byte.
    pub fn build_write_multiple_coils(address: u16, values: &[bool]) -> ModbusResult<ModbusPdu> {
        let quantity = checked_len(values.len(), MAX_WRITE_COILS)?;
        let coil_bytes = pack_bits(values);

        PduBuilder::new()
            .function_code(FC_WRITE_MULTIPLE_COILS)?
            .address(address)?
            .quantity(quantity)?
            .byte(coil_bytes.len() as u8)?
            .data(&coil_bytes)
            .map(Self::build)
    }

    /// Build a write multiple registers PDU (FC16)
    pub fn build_write_multiple_registers(address: u16, values: &[u16]) -> ModbusResult<ModbusPdu> {
        let quantity = checked_len(values.len(), MAX_WRITE_REGISTERS)?;

        let mut builder = PduBuilder::new()
            .function_code(FC_WRITE_MULTIPLE_REGISTERS)?
            .address(address)?
            .quantity(quantity)?
            .byte((values.len() * 2) as u8)?;

        for &value in values {
            builder = builder.word(value)?;
        }

        Ok(builder.build())
    }

    /// Build a report server id PDU (FC17)
    pub fn build_report_server_id() -> ModbusResult<ModbusPdu> {
        PduBuilder::new()
            .function_code(FC_REPORT_SERVER_ID)
            .map(Self::build)
    }

    /// Build a mask write register PDU (FC22)
    ///
    /// The device computes `(current AND and_mask) OR (or_mask AND NOT and_mask)`.
    pub fn build_mask_write_register(
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> ModbusResult<ModbusPdu> {
        PduBuilder::new()
            .function_code(FC_MASK_WRITE_REGISTER)?
            .address(address)?
            .word(and_mask)?
            .word(or_mask)
            .map(Self::build)
    }

    /// Build a read/write multiple registers PDU (FC23)
    pub fn build_read_write_multiple_registers(
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> ModbusResult<ModbusPdu> {
        check_quantity(read_quantity, MAX_READ_REGISTERS)?;
        let write_quantity = checked_len(values.len(), MAX_READ_WRITE_WRITE_REGISTERS)?;

        let mut builder = PduBuilder::new()
            .function_code(FC_READ_WRITE_MULTIPLE_REGISTERS)?
            .address(read_address)?
            .quantity(read_quantity)?
            .address(write_address)?
            .quantity(write_quantity)?
            .byte((values.len() * 2) as u8)?;

        for &value in values {
            builder = builder.word(value)?;
        }

        Ok(builder.build())
    }

    /// Build a read FIFO queue PDU (FC24)
    pub fn build_read_fifo_queue(fifo_address: u16) -> ModbusResult<ModbusPdu> {
        PduBuilder::new()
            .function_code(FC_READ_FIFO_QUEUE)?
            .address(fifo_address)
            .map(Self::build)
    }

    /// Build an encapsulated interface transport PDU (FC43)
    pub fn build_encapsulated_interface_transport(
        mei_type: u8,
        data: &[u8],
    ) -> ModbusResult<ModbusPdu> {
        check_pdu_size(1 + 1 + data.len())?;

        PduBuilder::new()
            .function_code(FC_ENCAPSULATED_INTERFACE_TRANSPORT)?
            .byte(mei_type)?
            .data(data)
            .map(Self::build)
    }
}

fn check_quantity(quantity: u16, max: u16) -> ModbusResult<()> {
    if quantity == 0 || quantity > max {
        return Err(ModbusError::invalid_argument(format!(
            "Invalid quantity {} (allowed 1-{})",
            quantity, max
        )));
    }
    Ok(())
}

fn checked_len(len: usize, max: u16) -> ModbusResult<u16> {
    if len == 0 || len > max as usize {
        return Err(ModbusError::invalid_argument(format!(
            "Invalid quantity {} (allowed 1-{})",
            len, max
        )));
    }
    Ok(len as u16)
}

fn check_pdu_size(size: usize) -> ModbusResult<()> {
    if size > MAX_PDU_SIZE {
        return Err(ModbusError::invalid_argument(format!(
            "PDU too large: {} bytes (max {})",
            size, MAX_PDU_SIZE
        )));
    }
    Ok(())
}

// ============================================================================
// Response checks
// ============================================================================

/// Raise the device exception if `response` is an exception PDU for `request`.
///
/// A response is an exception exactly when it is 2 bytes long and its first
/// byte is the request's function code with the high bit set.
pub fn check_exception(request: &ModbusPdu, response: &ModbusPdu) -> ModbusResult<()> {
    let Some(fc) = request.function_code() else {
        return Ok(());
    };
    let resp = response.as_slice();

    if resp.len() == EXCEPTION_PDU_SIZE && resp[0] == fc | EXCEPTION_FLAG {
        debug!("Exception response: FC={:02X}, code={:02X}", fc, resp[1]);
        return Err(ModbusError::exception(fc, resp[1]));
    }
    Ok(())
}

/// Require the response function code to equal the request's
pub fn expect_function(request: &ModbusPdu, response: &ModbusPdu) -> ModbusResult<()> {
    if response.function_code() != request.function_code() {
        return Err(mismatch("Function code mismatch", request, response));
    }
    Ok(())
}

/// Require an exact response length
pub fn expect_len(request: &ModbusPdu, response: &ModbusPdu, len: usize) -> ModbusResult<()> {
    if response.len() != len {
        return Err(mismatch(
            &format!("Expected {} byte response, got {}", len, response.len()),
            request,
            response,
        ));
    }
    Ok(())
}

/// Require the response to repeat the request byte for byte
pub fn expect_echo(request: &ModbusPdu, response: &ModbusPdu) -> ModbusResult<()> {
    if request != response {
        return Err(mismatch("Response does not echo request", request, response));
    }
    Ok(())
}

/// Build an [`ModbusError::InvalidResponse`] from a request/response pair
pub fn mismatch(message: &str, request: &ModbusPdu, response: &ModbusPdu) -> ModbusError {
    debug!(
        "Invalid response: {} request={:02X?} response={:02X?}",
        message,
        request.as_slice(),
        response.as_slice()
    );
    ModbusError::invalid_response(message, request.as_slice(), response.as_slice())
}

/// Pack bits LSB-first, 8 per byte
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpack `count` bits LSB-first; unused high bits of the last byte are dropped
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0))
        .collect()
}

/// Decode consecutive big-endian words
pub fn decode_registers(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|w| u16::from_be_bytes([w[0], w[1]]))
        .collect()
}
