//! Diagnostics (function code 0x08)
//!
//! [`GenericModbusClient::diagnostic_08`] is the general sub-function
//! primitive; the named methods below wrap it with the echo or decode rule
//! of each sub-function.
//!
//! ```rust,no_run
//! # use voltage_modbus_ascii::{ModbusAsciiTcpClient, ModbusResult};
//! # use std::time::Duration;
//! # async fn example() -> ModbusResult<()> {
//! let mut client = ModbusAsciiTcpClient::connect("127.0.0.1:502", Duration::from_secs(1)).await?;
//! client.return_query_data(1, &[0xA5, 0x37]).await?;
//! let messages = client.return_bus_message_count(1).await?;
//! println!("Bus messages: {}", messages);
//! # Ok(())
//! # }
//! ```

use tracing::debug;

use crate::client::GenericModbusClient;
use crate::error::{ModbusError, ModbusResult};
use crate::frame::FrameCodec;
use crate::pdu::{mismatch, ModbusPdu, PduBuilder};
use crate::protocol::{is_broadcast, DiagnosticSubFunction, UnitId};

/// Decode up to the first 8 bytes as a little-endian accumulator.
///
/// Bytes beyond the eighth are ignored.
fn decode_counter(payload: &[u8]) -> u64 {
    payload
        .iter()
        .take(8)
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | ((b as u64) << (8 * i)))
}

impl<F: FrameCodec> GenericModbusClient<F> {
    /// Send a diagnostics request and return the response data after the
    /// echoed sub-function.
    ///
    /// `data` must have even length. Broadcast requests are sent without
    /// waiting and return an empty vector.
    pub async fn diagnostic_08(
        &mut self,
        unit_id: UnitId,
        sub_function: u16,
        data: &[u8],
    ) -> ModbusResult<Vec<u8>> {
        match self.diagnostic_exchange(unit_id, sub_function, data).await? {
            Some((_, response)) => Ok(response.as_slice()[3..].to_vec()),
            None => Ok(Vec::new()),
        }
    }

    /// Request and validated response PDUs; `None` for broadcast
    async fn diagnostic_exchange(
        &mut self,
        unit_id: UnitId,
        sub_function: u16,
        data: &[u8],
    ) -> ModbusResult<Option<(ModbusPdu, ModbusPdu)>> {
        let request = PduBuilder::build_diagnostic(sub_function, data)?;

        if is_broadcast(unit_id) {
            self.send_request(unit_id, &request).await?;
            return Ok(None);
        }

        let response = self.execute_request(unit_id, &request).await?;
        check_diagnostic_response(&request, &response, sub_function)?;
        Ok(Some((request, response)))
    }

    async fn diagnostic_echo(
        &mut self,
        unit_id: UnitId,
        sub_function: DiagnosticSubFunction,
        data: &[u8],
    ) -> ModbusResult<()> {
        let exchanged = self
            .diagnostic_exchange(unit_id, sub_function.to_u16(), data)
            .await?;

        if let Some((request, response)) = exchanged {
            let returned = &response.as_slice()[3..];
            if returned != data {
                debug!(
                    "Diagnostic {:?} echoed {:02X?}, sent {:02X?}",
                    sub_function, returned, data
                );
                return Err(mismatch(
                    &format!("{:?} payload not echoed", sub_function),
                    &request,
                    &response,
                ));
            }
        }
        Ok(())
    }

    /// Counter and register requests; never broadcast
    async fn diagnostic_read(
        &mut self,
        unit_id: UnitId,
        sub_function: DiagnosticSubFunction,
    ) -> ModbusResult<(ModbusPdu, ModbusPdu)> {
        reject_broadcast_diagnostic(unit_id, sub_function)?;
        self.diagnostic_exchange(unit_id, sub_function.to_u16(), &[0x00, 0x00])
            .await?
            .ok_or_else(|| {
                ModbusError::invalid_argument(format!("{:?} cannot be broadcast", sub_function))
            })
    }

    async fn diagnostic_counter(
        &mut self,
        unit_id: UnitId,
        sub_function: DiagnosticSubFunction,
    ) -> ModbusResult<u64> {
        let (request, response) = self.diagnostic_read(unit_id, sub_function).await?;

        let payload = &response.as_slice()[3..];
        if payload.is_empty() {
            return Err(mismatch(
                &format!("{:?} returned no counter", sub_function),
                &request,
                &response,
            ));
        }
        Ok(decode_counter(payload))
    }

    /// Return Query Data (0x00): the device must echo `data` unchanged
    pub async fn return_query_data(&mut self, unit_id: UnitId, data: &[u8]) -> ModbusResult<()> {
        self.diagnostic_echo(unit_id, DiagnosticSubFunction::ReturnQueryData, data)
            .await
    }

    /// Restart Communications Option (0x01)
    ///
    /// With `clear_log` the device also clears its comm event log.
    pub async fn restart_communications(
        &mut self,
        unit_id: UnitId,
        clear_log: bool,
    ) -> ModbusResult<()> {
        let data = if clear_log { [0xFF, 0x00] } else { [0x00, 0x00] };
        self.diagnostic_echo(
            unit_id,
            DiagnosticSubFunction::RestartCommunicationsOption,
            &data,
        )
        .await
    }

    /// Return Diagnostic Register (0x02)
    pub async fn return_diagnostic_register(&mut self, unit_id: UnitId) -> ModbusResult<u16> {
        let sub_function = DiagnosticSubFunction::ReturnDiagnosticRegister;
        let (request, response) = self.diagnostic_read(unit_id, sub_function).await?;

        let payload = &response.as_slice()[3..];
        match payload {
            [high, low] => Ok(u16::from_be_bytes([*high, *low])),
            _ => Err(mismatch(
                &format!("Diagnostic register must be 2 bytes, got {}", payload.len()),
                &request,
                &response,
            )),
        }
    }

    /// Change ASCII Input Delimiter (0x03)
    ///
    /// Replaces LF as the end-of-message character on the device.
    pub async fn change_ascii_input_delimiter(
        &mut self,
        unit_id: UnitId,
        delimiter: u8,
    ) -> ModbusResult<()> {
        self.diagnostic_echo(
            unit_id,
            DiagnosticSubFunction::ChangeAsciiInputDelimiter,
            &[delimiter, 0x00],
        )
        .await
    }

    /// Force Listen Only Mode (0x04)
    ///
    /// The device stops responding, so the request is only sent.
    pub async fn force_listen_only_mode(&mut self, unit_id: UnitId) -> ModbusResult<()> {
        let request = PduBuilder::build_diagnostic(
            DiagnosticSubFunction::ForceListenOnlyMode.to_u16(),
            &[0x00, 0x00],
        )?;
        self.send_request(unit_id, &request).await
    }

    /// Clear Counters and Diagnostic Register (0x0A)
    pub async fn clear_counters_and_diagnostic_register(
        &mut self,
        unit_id: UnitId,
    ) -> ModbusResult<()> {
        self.diagnostic_echo(
            unit_id,
            DiagnosticSubFunction::ClearCountersAndDiagnosticRegister,
            &[0x00, 0x00],
        )
        .await
    }

    /// Return Bus Message Count (0x0B)
    pub async fn return_bus_message_count(&mut self, unit_id: UnitId) -> ModbusResult<u64> {
        self.diagnostic_counter(unit_id, DiagnosticSubFunction::ReturnBusMessageCount)
            .await
    }

    /// Return Bus Communication Error Count (0x0C)
    pub async fn return_bus_communication_error_count(
        &mut self,
        unit_id: UnitId,
    ) -> ModbusResult<u64> {
        self.diagnostic_counter(
            unit_id,
            DiagnosticSubFunction::ReturnBusCommunicationErrorCount,
        )
        .await
    }

    /// Return Bus Exception Error Count (0x0D)
    pub async fn return_bus_exception_error_count(&mut self, unit_id: UnitId) -> ModbusResult<u64> {
        self.diagnostic_counter(unit_id, DiagnosticSubFunction::ReturnBusExceptionErrorCount)
            .await
    }

    /// Return Server Message Count (0x0E)
    pub async fn return_server_message_count(&mut self, unit_id: UnitId) -> ModbusResult<u64> {
        self.diagnostic_counter(unit_id, DiagnosticSubFunction::ReturnServerMessageCount)
            .await
    }

    /// Return Server No Response Count (0x0F)
    pub async fn return_server_no_response_count(&mut self, unit_id: UnitId) -> ModbusResult<u64> {
        self.diagnostic_counter(unit_id, DiagnosticSubFunction::ReturnServerNoResponseCount)
            .await
    }

    /// Return Server NAK Count (0x10)
    pub async fn return_server_nak_count(&mut self, unit_id: UnitId) -> ModbusResult<u64> {
        self.diagnostic_counter(unit_id, DiagnosticSubFunction::ReturnServerNakCount)
            .await
    }

    /// Return Server Busy Count (0x11)
    pub async fn return_server_busy_count(&mut self, unit_id: UnitId) -> ModbusResult<u64> {
        self.diagnostic_counter(unit_id, DiagnosticSubFunction::ReturnServerBusyCount)
            .await
    }

    /// Return Bus Character Overrun Count (0x12)
    pub async fn return_bus_character_overrun_count(
        &mut self,
        unit_id: UnitId,
    ) -> ModbusResult<u64> {
        self.diagnostic_counter(unit_id, DiagnosticSubFunction::ReturnBusCharacterOverrunCount)
            .await
    }

    /// Clear Overrun Counter and Flag (0x14)
    pub async fn clear_overrun_counter_and_flag(&mut self, unit_id: UnitId) -> ModbusResult<()> {
        self.diagnostic_echo(
            unit_id,
            DiagnosticSubFunction::ClearOverrunCounterAndFlag,
            &[0x00, 0x00],
        )
        .await
    }
}

fn reject_broadcast_diagnostic(
    unit_id: UnitId,
    sub_function: DiagnosticSubFunction,
) -> ModbusResult<()> {
    if is_broadcast(unit_id) {
        return Err(ModbusError::invalid_argument(format!(
            "{:?} returns data and cannot be broadcast",
            sub_function
        )));
    }
    Ok(())
}

fn check_diagnostic_response(
    request: &ModbusPdu,
    response: &ModbusPdu,
    sub_function: u16,
) -> ModbusResult<()> {
    if response.function_code() != request.function_code() {
        return Err(mismatch("Function code mismatch", request, response));
    }
    match response.u16_at(1) {
        Some(echoed) if echoed == sub_function => Ok(()),
        Some(echoed) => Err(mismatch(
            &format!(
                "Sub-function 0x{:04X} echoed as 0x{:04X}",
                sub_function, echoed
            ),
            request,
            response,
        )),
        None => Err(mismatch("Diagnostic response too short", request, response)),
    }
}
