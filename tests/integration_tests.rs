//! End-to-end tests: ASCII master against a loopback TCP device

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_test::{assert_err, assert_ok};

use voltage_modbus_ascii::frame::{decode_frame, encode_frame};
use voltage_modbus_ascii::{
    MasterConfig, ModbusAsciiTcpClient, ModbusClient, ModbusError, ModbusPdu,
};

/// How the simulated device answers one request PDU
type Handler = fn(u8, &[u8]) -> Reply;

enum Reply {
    Pdu(Vec<u8>),
    Raw(Vec<u8>),
    Silent,
}

async fn read_request(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut frame = Vec::new();
    loop {
        let byte = socket.read_u8().await.ok()?;
        frame.push(byte);
        if frame.ends_with(b"\r\n") {
            return Some(frame);
        }
    }
}

/// Spawn a device that answers every request with `handler`
async fn spawn_device(handler: Handler) -> (String, JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut seen = Vec::new();

        while let Some(frame) = read_request(&mut socket).await {
            let (unit, pdu) = decode_frame(&frame).unwrap();
            seen.push(pdu.as_slice().to_vec());

            match handler(unit, pdu.as_slice()) {
                Reply::Pdu(response) => {
                    let reply = encode_frame(unit, &response);
                    socket.write_all(&reply).await.unwrap();
                }
                Reply::Raw(bytes) => socket.write_all(&bytes).await.unwrap(),
                Reply::Silent => {}
            }
        }
        seen
    });

    (addr, task)
}

/// Holding registers hold their own address; writes are echoed
fn register_device(_unit: u8, request: &[u8]) -> Reply {
    match request[0] {
        0x03 => {
            let start = u16::from_be_bytes([request[1], request[2]]);
            let quantity = u16::from_be_bytes([request[3], request[4]]);
            let mut response = vec![0x03, (quantity * 2) as u8];
            for address in start..start + quantity {
                response.extend_from_slice(&address.to_be_bytes());
            }
            Reply::Pdu(response)
        }
        0x01 => Reply::Pdu(vec![0x01, 0x02, 0b1010_1010, 0b0000_0001]),
        0x06 => Reply::Pdu(request.to_vec()),
        0x08 => Reply::Pdu(request.to_vec()),
        _ => Reply::Pdu(vec![request[0] | 0x80, 0x01]),
    }
}

async fn connect(addr: &str, timeout_ms: u64) -> ModbusAsciiTcpClient {
    let config = MasterConfig::new().with_timeout(Duration::from_millis(timeout_ms));
    ModbusAsciiTcpClient::connect_with_config(addr, &config)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_read_and_write_over_tcp() {
    let (addr, device) = spawn_device(register_device).await;
    let mut client = connect(&addr, 1000).await;
    assert!(client.is_connected());

    let values = assert_ok!(client.read_holding_registers(1, 10, 3).await);
    assert_eq!(values, vec![10, 11, 12]);

    let coils = assert_ok!(client.read_coils(1, 0, 9).await);
    assert_eq!(
        coils,
        vec![false, true, false, true, false, true, false, true, true]
    );

    assert_ok!(client.write_single_register(1, 5, 100).await);
    assert_ok!(client.return_query_data(1, &[0xA5, 0x37]).await);

    let stats = client.get_stats();
    assert_eq!(stats.frames_sent, 4);
    assert!(stats.bytes_received > 0);

    client.close().await.unwrap();
    let seen = device.await.unwrap();
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[0], vec![0x03, 0x00, 0x0A, 0x00, 0x03]);
}

#[tokio::test]
async fn test_device_exception_over_tcp() {
    let (addr, device) = spawn_device(register_device).await;
    let mut client = connect(&addr, 1000).await;

    let error = assert_err!(client.read_input_registers(1, 0, 1).await);
    match error {
        ModbusError::Exception { function, code, .. } => {
            assert_eq!(function, 0x04);
            assert_eq!(code, 0x01);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    client.close().await.unwrap();
    device.await.unwrap();
}

#[tokio::test]
async fn test_silent_device_times_out() {
    let (addr, device) = spawn_device(|_, _| Reply::Silent).await;
    let mut client = connect(&addr, 100).await;

    let started = tokio::time::Instant::now();
    let result = client.read_03(1, 0, 1).await;
    assert!(matches!(
        result,
        Err(ModbusError::Timeout { timeout_ms: 100, .. })
    ));
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(result.unwrap_err().status_code(), 3);

    client.close().await.unwrap();
    device.await.unwrap();
}

#[tokio::test]
async fn test_trickling_bytes_do_not_extend_deadline() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    // Sends a valid prefix one byte every 30 ms and never terminates
    let device = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        for &byte in b":0103020001" {
            if socket.write_all(&[byte]).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
    });

    let mut client = connect(&addr, 150).await;
    let started = tokio::time::Instant::now();
    let result = client.read_03(1, 0, 1).await;

    assert!(matches!(result, Err(ModbusError::Timeout { .. })));
    assert!(started.elapsed() < Duration::from_millis(290));

    client.close().await.unwrap();
    device.await.unwrap();
}

#[tokio::test]
async fn test_late_reply_is_not_taken_for_next_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    // Answers the first request after the client gave up, the rest at once
    let device = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut first = true;
        while let Some(frame) = read_request(&mut socket).await {
            let (unit, pdu) = decode_frame(&frame).unwrap();
            if first {
                tokio::time::sleep(Duration::from_millis(150)).await;
                first = false;
            }
            if let Reply::Pdu(response) = register_device(unit, pdu.as_slice()) {
                socket.write_all(&encode_frame(unit, &response)).await.unwrap();
            }
        }
    });

    let mut client = connect(&addr, 100).await;
    let first = client.read_03(1, 0, 1).await;
    assert!(matches!(first, Err(ModbusError::Timeout { .. })));

    // Let the late reply land in the receive buffer
    tokio::time::sleep(Duration::from_millis(150)).await;
    let second = assert_ok!(client.read_03(1, 5, 1).await);
    assert_eq!(second, vec![5]);

    client.close().await.unwrap();
    device.await.unwrap();
}

#[tokio::test]
async fn test_short_terminated_reply_times_out() {
    let (addr, device) = spawn_device(|_, _| Reply::Raw(b":3001\r\n".to_vec())).await;
    let mut client = connect(&addr, 100).await;

    let started = tokio::time::Instant::now();
    let result = client.read_03(1, 0, 1).await;
    assert!(matches!(
        result,
        Err(ModbusError::Timeout { timeout_ms: 100, .. })
    ));
    assert!(started.elapsed() >= Duration::from_millis(100));

    client.close().await.unwrap();
    device.await.unwrap();
}

#[tokio::test]
async fn test_wrong_unit_and_bad_lrc() {
    fn device(unit: u8, request: &[u8]) -> Reply {
        match request[0] {
            // Answer from another unit
            0x03 => Reply::Raw(encode_frame(unit + 1, &[0x03, 0x02, 0x00, 0x01]).to_vec()),
            // Corrupt the LRC
            _ => {
                let mut frame = encode_frame(unit, request).to_vec();
                let lrc_pos = frame.len() - 3;
                frame[lrc_pos] = if frame[lrc_pos] == b'0' { b'1' } else { b'0' };
                Reply::Raw(frame)
            }
        }
    }

    let (addr, handle) = spawn_device(device).await;
    let mut client = connect(&addr, 1000).await;

    assert!(matches!(
        client.read_03(1, 0, 1).await,
        Err(ModbusError::InvalidResponse { .. })
    ));
    assert!(matches!(
        client.write_06(1, 0, 1).await,
        Err(ModbusError::InvalidResponse { .. })
    ));

    client.close().await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_invalid_character_fails_fast() {
    let (addr, device) =
        spawn_device(|_, _| Reply::Raw(b":01\x0703020001F9\r\n".to_vec())).await;
    let mut client = connect(&addr, 2000).await;

    let started = tokio::time::Instant::now();
    let result = client.read_03(1, 0, 1).await;
    assert!(matches!(result, Err(ModbusError::MalformedFrame { .. })));
    assert!(started.elapsed() < Duration::from_millis(1000));

    client.close().await.unwrap();
    device.await.unwrap();
}

#[tokio::test]
async fn test_broadcast_write_gets_no_reply() {
    let (addr, device) = spawn_device(|_, _| Reply::Silent).await;
    let mut client = connect(&addr, 1000).await;

    let started = tokio::time::Instant::now();
    assert_ok!(client.write_06(0xFF, 1, 2).await);
    assert_ok!(client.force_listen_only_mode(1).await);
    assert!(started.elapsed() < Duration::from_millis(500));

    client.close().await.unwrap();
    let seen = device.await.unwrap();
    assert_eq!(
        seen,
        vec![
            vec![0x06, 0x00, 0x01, 0x00, 0x02],
            vec![0x08, 0x00, 0x04, 0x00, 0x00]
        ]
    );
}

#[test]
fn test_pdu_is_bounded() {
    assert!(ModbusPdu::from_slice(&[0u8; 253]).is_ok());
    assert!(ModbusPdu::from_slice(&[0u8; 254]).is_err());
}
