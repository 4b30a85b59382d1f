//! # ASCII Frame Codec
//!
//! Wraps a PDU into a Modbus ASCII frame and back:
//!
//! ```text
//! Start -> Address -> Function -> Data -> LRC -> End
//!   :        01         03       00000002   FA   \r\n
//! ```
//!
//! - **Start**: ':' (0x3A)
//! - **Address**, **PDU**, **LRC**: every byte as two uppercase hex characters,
//!   high nibble first
//! - **LRC**: two's complement of the sum of address and PDU bytes
//! - **End**: CR LF (0x0D 0x0A)
//!
//! The PDU layer only sees [`FrameCodec`]; [`AsciiFrameCodec`] implements it
//! on top of any [`ModbusTransport`]. A binary framing or another byte
//! channel can be swapped in independently.

use std::future::Future;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::constants::{
    ASCII_CR, ASCII_LF, ASCII_START, MAX_ASCII_FRAME_SIZE, MAX_PDU_SIZE, MIN_ASCII_FRAME_SIZE,
};
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::ModbusPdu;
use crate::protocol::UnitId;
use crate::transport::{format_hex_packet, ModbusTransport, TransportStats};

/// PDU exchange interface used by the client.
pub trait FrameCodec: Send {
    /// Frame and send `request` to `unit_id`, then receive and unframe the
    /// response PDU.
    fn exchange(
        &mut self,
        unit_id: UnitId,
        request: &ModbusPdu,
    ) -> impl Future<Output = ModbusResult<ModbusPdu>> + Send;

    /// Frame and send `request` without waiting for a response.
    fn send_only(
        &mut self,
        unit_id: UnitId,
        request: &ModbusPdu,
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Check if the underlying connection is active
    fn is_connected(&self) -> bool;

    /// Close the underlying connection
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Get transport statistics
    fn get_stats(&self) -> TransportStats;
}

/// Calculate the LRC (Longitudinal Redundancy Check) of `data`.
///
/// Two's complement of the 8-bit sum, so that the sum of `data` followed by
/// its LRC is zero modulo 256.
pub fn lrc(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
        .wrapping_neg()
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

#[inline]
fn put_hex_byte(buf: &mut BytesMut, byte: u8) {
    buf.put_u8(HEX_DIGITS[(byte >> 4) as usize]);
    buf.put_u8(HEX_DIGITS[(byte & 0x0F) as usize]);
}

#[inline]
fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Encode `unit_id` + `pdu` into a complete ASCII frame.
pub fn encode_frame(unit_id: UnitId, pdu: &[u8]) -> BytesMut {
    let mut frame = BytesMut::with_capacity(1 + (pdu.len() + 2) * 2 + 2);

    frame.put_u8(ASCII_START);
    put_hex_byte(&mut frame, unit_id);
    for &byte in pdu {
        put_hex_byte(&mut frame, byte);
    }

    let sum = pdu.iter().fold(unit_id, |sum, &b| sum.wrapping_add(b));
    put_hex_byte(&mut frame, sum.wrapping_neg());

    frame.put_u8(ASCII_CR);
    frame.put_u8(ASCII_LF);
    frame
}

/// Decode a complete ASCII frame into `(unit id, PDU)`.
///
/// Structural problems (markers, odd length, non-hex characters, too short)
/// fail with [`ModbusError::MalformedFrame`]; a bad LRC fails with
/// [`ModbusError::InvalidResponse`]. The unit id is returned unchecked.
pub fn decode_frame(frame: &[u8]) -> ModbusResult<(UnitId, ModbusPdu)> {
    let body = frame
        .strip_prefix(&[ASCII_START])
        .and_then(|f| f.strip_suffix(&[ASCII_CR, ASCII_LF]))
        .ok_or_else(|| ModbusError::malformed_frame("Missing start marker or CR LF terminator"))?;

    if body.len() % 2 != 0 {
        return Err(ModbusError::malformed_frame(format!(
            "Odd number of hex characters: {}",
            body.len()
        )));
    }

    let raw = body
        .chunks_exact(2)
        .map(|pair| match (hex_value(pair[0]), hex_value(pair[1])) {
            (Some(high), Some(low)) => Ok((high << 4) | low),
            _ => Err(ModbusError::malformed_frame(format!(
                "Invalid hex pair {:?}",
                String::from_utf8_lossy(pair)
            ))),
        })
        .collect::<ModbusResult<Vec<u8>>>()?;

    // Address, function code, LRC
    if raw.len() < 3 {
        return Err(ModbusError::malformed_frame(format!(
            "Frame too short: {} bytes after decoding",
            raw.len()
        )));
    }
    if raw.len() - 2 > MAX_PDU_SIZE {
        return Err(ModbusError::malformed_frame(format!(
            "PDU of {} bytes exceeds {}",
            raw.len() - 2,
            MAX_PDU_SIZE
        )));
    }

    let (content, received_lrc) = raw.split_at(raw.len() - 1);
    let calculated_lrc = lrc(content);
    if received_lrc[0] != calculated_lrc {
        return Err(ModbusError::invalid_response(
            format!(
                "LRC mismatch: expected 0x{:02X}, got 0x{:02X}",
                calculated_lrc, received_lrc[0]
            ),
            &[],
            &raw,
        ));
    }

    let pdu = ModbusPdu::from_slice(&content[1..])
        .map_err(|e| ModbusError::malformed_frame(e.to_string()))?;
    Ok((content[0], pdu))
}

/// States of the ASCII receive loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    /// Discarding bytes until ':'
    AwaitStart,
    /// Accumulating hex characters until CR LF
    AwaitData,
    /// CR LF seen after at least address, function code and LRC
    Complete,
}

/// Receive one ASCII frame from `transport` before `deadline`.
///
/// Every byte wait is bounded by the time remaining to the single deadline,
/// so partial receives never extend the total wait. A byte that is neither a
/// hex digit nor CR/LF aborts immediately with
/// [`ModbusError::MalformedFrame`].
pub async fn receive_frame<T: ModbusTransport>(
    transport: &mut T,
    deadline: Instant,
    timeout_ms: u64,
) -> ModbusResult<BytesMut> {
    let mut frame = BytesMut::with_capacity(64);
    let mut state = ReceiveState::AwaitStart;

    while state != ReceiveState::Complete {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!(
                "ASCII receive timed out in {:?} after {} bytes",
                state,
                frame.len()
            );
            return Err(ModbusError::timeout("receive ASCII frame", timeout_ms));
        }

        let byte = match transport.receive_byte(remaining).await {
            Ok(byte) => byte,
            Err(ModbusError::Timeout { .. }) => {
                return Err(ModbusError::timeout("receive ASCII frame", timeout_ms))
            }
            Err(e) => return Err(e),
        };

        state = match state {
            ReceiveState::AwaitStart => {
                if byte == ASCII_START {
                    frame.put_u8(byte);
                    ReceiveState::AwaitData
                } else {
                    ReceiveState::AwaitStart
                }
            }
            ReceiveState::AwaitData => {
                if hex_value(byte).is_none() && byte != ASCII_CR && byte != ASCII_LF {
                    return Err(ModbusError::malformed_frame(format!(
                        "Unexpected byte 0x{:02X} in ASCII frame",
                        byte
                    )));
                }
                frame.put_u8(byte);

                if frame.len() > MAX_ASCII_FRAME_SIZE {
                    return Err(ModbusError::malformed_frame("ASCII frame too large"));
                }

                if frame.len() >= MIN_ASCII_FRAME_SIZE && frame.ends_with(&[ASCII_CR, ASCII_LF]) {
                    ReceiveState::Complete
                } else {
                    ReceiveState::AwaitData
                }
            }
            ReceiveState::Complete => ReceiveState::Complete,
        };
    }

    Ok(frame)
}

/// Modbus ASCII framing over a byte transport
pub struct AsciiFrameCodec<T: ModbusTransport> {
    transport: T,
    timeout: Duration,
}

impl<T: ModbusTransport> AsciiFrameCodec<T> {
    /// Create a codec with the given response timeout
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Response timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the response timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    async fn send_frame(&mut self, unit_id: UnitId, request: &ModbusPdu) -> ModbusResult<()> {
        let frame = encode_frame(unit_id, request.as_slice());
        debug!(
            "Sending ASCII frame to unit {}: {}",
            unit_id,
            String::from_utf8_lossy(&frame).trim_end()
        );
        self.transport.send_all(&frame).await
    }
}

impl<T: ModbusTransport> FrameCodec for AsciiFrameCodec<T> {
    async fn exchange(&mut self, unit_id: UnitId, request: &ModbusPdu) -> ModbusResult<ModbusPdu> {
        // Late replies to earlier requests carry no id to tell them apart
        let stale = self.transport.discard_pending().await?;
        if stale > 0 {
            warn!("Dropped {} stale bytes before request to unit {}", stale, unit_id);
        }
        self.send_frame(unit_id, request).await?;

        let timeout_ms = self.timeout.as_millis() as u64;
        let deadline = Instant::now() + self.timeout;
        let frame = receive_frame(&mut self.transport, deadline, timeout_ms).await?;

        let (address, response) = decode_frame(&frame).map_err(|e| match e {
            // Attach the request to checksum failures
            ModbusError::InvalidResponse {
                message, response, ..
            } => ModbusError::InvalidResponse {
                message,
                request: request.as_slice().to_vec(),
                response,
            },
            other => other,
        })?;

        if address != unit_id {
            warn!(
                "Response from unit {} to request for unit {}: {}",
                address,
                unit_id,
                format_hex_packet(response.as_slice())
            );
            return Err(ModbusError::invalid_response(
                format!("Unit address mismatch: expected {}, got {}", unit_id, address),
                request.as_slice(),
                response.as_slice(),
            ));
        }

        Ok(response)
    }

    async fn send_only(&mut self, unit_id: UnitId, request: &ModbusPdu) -> ModbusResult<()> {
        self.send_frame(unit_id, request).await
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.transport.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.transport.get_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    /// Transport that replays scripted bytes and records what was sent.
    ///
    /// `pending` is already waiting before the request; `incoming` is the reply.
    struct ScriptedTransport {
        pending: VecDeque<u8>,
        incoming: VecDeque<u8>,
        sent: Vec<u8>,
    }

    impl ScriptedTransport {
        fn new(incoming: &[u8]) -> Self {
            Self {
                pending: VecDeque::new(),
                incoming: incoming.iter().copied().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl ModbusTransport for ScriptedTransport {
        async fn send_all(&mut self, bytes: &[u8]) -> ModbusResult<()> {
            self.sent.extend_from_slice(bytes);
            Ok(())
        }

        async fn receive_byte(&mut self, wait: Duration) -> ModbusResult<u8> {
            match self.pending.pop_front().or_else(|| self.incoming.pop_front()) {
                Some(byte) => Ok(byte),
                None => {
                    tokio::time::sleep(wait).await;
                    Err(ModbusError::timeout("receive byte", wait.as_millis() as u64))
                }
            }
        }

        async fn discard_pending(&mut self) -> ModbusResult<usize> {
            let discarded = self.pending.len();
            self.pending.clear();
            Ok(discarded)
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn close(&mut self) -> ModbusResult<()> {
            Ok(())
        }

        fn get_stats(&self) -> TransportStats {
            TransportStats::default()
        }
    }

    fn scripted_codec(incoming: &[u8], timeout_ms: u64) -> AsciiFrameCodec<ScriptedTransport> {
        AsciiFrameCodec::new(
            ScriptedTransport::new(incoming),
            Duration::from_millis(timeout_ms),
        )
    }

    #[test]
    fn test_lrc_calculation() {
        // 01 03 00 00 00 02 sums to 6, LRC = 0xFA
        assert_eq!(lrc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]), 0xFA);
        assert_eq!(lrc(&[]), 0x00);
        assert_eq!(lrc(&[0xFF, 0x01]), 0x00);
    }

    #[test]
    fn test_encode_frame() {
        let frame = encode_frame(0x01, &[0x03, 0x00, 0x00, 0x00, 0x02]);
        assert_eq!(&frame[..], b":010300000002FA\r\n");

        let frame = encode_frame(0x11, &[0x06, 0x00, 0x01, 0x00, 0x03]);
        assert_eq!(&frame[..], b":110600010003E5\r\n");
    }

    #[test]
    fn test_decode_frame() {
        let (unit, pdu) = decode_frame(b":010304000A000BE3\r\n").unwrap();
        assert_eq!(unit, 0x01);
        assert_eq!(pdu.as_slice(), &[0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B]);

        // Lowercase hex is accepted
        let (_, pdu) = decode_frame(b":010304000a000be3\r\n").unwrap();
        assert_eq!(pdu.as_slice(), &[0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B]);
    }

    #[test]
    fn test_decode_frame_structure_errors() {
        let odd = decode_frame(b":0103040\r\n");
        assert!(matches!(odd, Err(ModbusError::MalformedFrame { .. })));

        let no_start = decode_frame(b"010300000002FA\r\n");
        assert!(matches!(no_start, Err(ModbusError::MalformedFrame { .. })));

        let no_end = decode_frame(b":010300000002FA");
        assert!(matches!(no_end, Err(ModbusError::MalformedFrame { .. })));

        let bad_hex = decode_frame(b":01G300000002FA\r\n");
        assert!(matches!(bad_hex, Err(ModbusError::MalformedFrame { .. })));

        let short = decode_frame(b":0101\r\n");
        assert!(matches!(short, Err(ModbusError::MalformedFrame { .. })));
    }

    #[test]
    fn test_decode_frame_lrc_mismatch() {
        let result = decode_frame(b":010300000002FB\r\n");
        match result {
            Err(ModbusError::InvalidResponse { message, response, .. }) => {
                assert!(message.contains("LRC mismatch"));
                assert_eq!(response, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xFB]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_receive_frame_skips_noise_before_start() {
        let mut transport = ScriptedTransport::new(b"\x00junk:0107F8\r\n");
        let deadline = Instant::now() + Duration::from_millis(200);
        let frame = receive_frame(&mut transport, deadline, 200).await.unwrap();
        assert_eq!(&frame[..], b":0107F8\r\n");
    }

    #[tokio::test]
    async fn test_receive_frame_stops_at_terminator() {
        let mut transport = ScriptedTransport::new(b":0107F8\r\n:0207F7\r\n");
        let deadline = Instant::now() + Duration::from_millis(200);
        let frame = receive_frame(&mut transport, deadline, 200).await.unwrap();
        assert_eq!(&frame[..], b":0107F8\r\n");
        // The next frame is left unread
        assert_eq!(transport.incoming.len(), b":0207F7\r\n".len());
    }

    #[tokio::test]
    async fn test_receive_frame_rejects_invalid_character_immediately() {
        let mut transport = ScriptedTransport::new(b":01Z3\r\n");
        let deadline = Instant::now() + Duration::from_millis(200);
        let result = receive_frame(&mut transport, deadline, 200).await;
        assert!(matches!(result, Err(ModbusError::MalformedFrame { .. })));
        // Did not wait for the terminator
        assert_eq!(transport.incoming.len(), 3);
    }

    #[tokio::test]
    async fn test_receive_frame_short_frame_waits_for_deadline() {
        // CR LF after only two bytes is not a complete frame
        let mut transport = ScriptedTransport::new(b":3001\r\n");
        let start = Instant::now();
        let deadline = start + Duration::from_millis(50);
        let result = receive_frame(&mut transport, deadline, 50).await;

        assert!(matches!(
            result,
            Err(ModbusError::Timeout { timeout_ms: 50, .. })
        ));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_receive_frame_expired_deadline() {
        let mut transport = ScriptedTransport::new(b":0107F8\r\n");
        let deadline = Instant::now();
        let result = receive_frame(&mut transport, deadline, 0).await;
        assert!(matches!(result, Err(ModbusError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_exchange_round_trip() {
        let mut codec = scripted_codec(b":010304000A000BE3\r\n", 200);
        let request = ModbusPdu::from_slice(&[0x03, 0x00, 0x00, 0x00, 0x02]).unwrap();

        let response = codec.exchange(0x01, &request).await.unwrap();
        assert_eq!(response.as_slice(), &[0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B]);
        assert_eq!(codec.transport().sent, b":010300000002FA\r\n".to_vec());
    }

    #[tokio::test]
    async fn test_exchange_discards_late_reply() {
        // Reply to an earlier read that timed out, holding 0
        let mut codec = scripted_codec(b":0103020005F5\r\n", 200);
        codec
            .transport_mut()
            .pending
            .extend(b":0103020000FA\r\n".iter().copied());
        let request = ModbusPdu::from_slice(&[0x03, 0x00, 0x05, 0x00, 0x01]).unwrap();

        let response = codec.exchange(0x01, &request).await.unwrap();
        assert_eq!(response.as_slice(), &[0x03, 0x02, 0x00, 0x05]);
        assert!(codec.transport().pending.is_empty());
    }

    #[tokio::test]
    async fn test_exchange_unit_mismatch() {
        let reply = encode_frame(0x02, &[0x03, 0x02, 0x00, 0x01]);
        let mut codec = scripted_codec(&reply, 200);
        let request = ModbusPdu::from_slice(&[0x03, 0x00, 0x00, 0x00, 0x01]).unwrap();

        match codec.exchange(0x01, &request).await {
            Err(ModbusError::InvalidResponse { request: req, message, .. }) => {
                assert!(message.contains("Unit address mismatch"));
                assert_eq!(req, request.as_slice().to_vec());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_lrc_mismatch_carries_request() {
        let mut codec = scripted_codec(b":010304000A000BE6\r\n", 200);
        let request = ModbusPdu::from_slice(&[0x03, 0x00, 0x00, 0x00, 0x02]).unwrap();

        match codec.exchange(0x01, &request).await {
            Err(ModbusError::InvalidResponse { request: req, .. }) => {
                assert_eq!(req, request.as_slice().to_vec());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_only_does_not_read() {
        let mut codec = scripted_codec(b":FF", 200);
        let request = ModbusPdu::from_slice(&[0x06, 0x00, 0x05, 0x00, 0x64]).unwrap();

        codec.send_only(0xFF, &request).await.unwrap();
        assert_eq!(codec.transport().sent, encode_frame(0xFF, request.as_slice()).to_vec());
        assert_eq!(codec.transport().incoming.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_lrc_sums_to_zero(data in proptest::collection::vec(any::<u8>(), 0..300)) {
            let checksum = lrc(&data);
            let total = data
                .iter()
                .chain(std::iter::once(&checksum))
                .fold(0u8, |sum, &b| sum.wrapping_add(b));
            prop_assert_eq!(total, 0);
        }

        #[test]
        fn prop_frame_round_trip(
            unit in 0u8..0xFF,
            pdu in proptest::collection::vec(any::<u8>(), 1..=MAX_PDU_SIZE),
        ) {
            let frame = encode_frame(unit, &pdu);
            prop_assert_eq!(frame.len(), 1 + (pdu.len() + 2) * 2 + 2);

            let (decoded_unit, decoded_pdu) = decode_frame(&frame).unwrap();
            prop_assert_eq!(decoded_unit, unit);
            prop_assert_eq!(decoded_pdu.as_slice(), pdu.as_slice());

            let reencoded = encode_frame(decoded_unit, decoded_pdu.as_slice());
            prop_assert_eq!(reencoded, frame);
        }
    }
}
