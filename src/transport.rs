//! # Byte Transport Layer
//!
//! The frame codec talks to the wire only through [`ModbusTransport`]:
//! send a whole buffer, receive one byte within a timeout. Connection
//! lifecycle (connect, close) belongs to the transport.
//!
//! ## Supported Transports
//!
//! - [`TcpTransport`] - ASCII frames over a TCP socket
//! - `SerialTransport` - ASCII frames over a serial line (requires `serial` feature)
//!
//! ## Transport Statistics
//!
//! ```rust,no_run
//! # use voltage_modbus_ascii::transport::{ModbusTransport, TransportStats};
//! # fn example(transport: &impl ModbusTransport) {
//! let stats = transport.get_stats();
//! println!("Bytes sent: {}", stats.bytes_sent);
//! println!("Bytes received: {}", stats.bytes_received);
//! println!("Timeouts: {}", stats.timeouts);
//! # }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{ModbusError, ModbusResult};

/// Format raw bytes as hex string for packet logging
pub(crate) fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log packet with direction and protocol tag
fn log_packet(direction: &str, data: &[u8], protocol: &str) {
    info!("[MODBUS-{}] {} {}", protocol, direction, format_hex_packet(data));
}

/// Read and drop whatever `reader` can deliver without waiting
async fn drain_ready<R: AsyncRead + Unpin + Send>(reader: &mut R) -> std::io::Result<usize> {
    let mut scratch = [0u8; 256];
    let mut discarded = 0;
    loop {
        match timeout(Duration::ZERO, reader.read(&mut scratch)).await {
            Ok(Ok(0)) | Err(_) => return Ok(discarded),
            Ok(Ok(n)) => discarded += n,
            Ok(Err(e)) => return Err(e),
        }
    }
}

/// Byte-level transport consumed by the frame codec.
///
/// Implementations own the connection and are not shared between
/// concurrent requests.
pub trait ModbusTransport: Send {
    /// Send the whole buffer.
    fn send_all(&mut self, bytes: &[u8]) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Receive one byte, waiting at most `timeout`.
    ///
    /// Fails with [`ModbusError::Timeout`] if nothing arrives in time.
    fn receive_byte(&mut self, timeout: Duration)
        -> impl Future<Output = ModbusResult<u8>> + Send;

    /// Drop every byte that is already buffered or readable without waiting.
    ///
    /// Returns the number of bytes discarded. A reply that arrives after its
    /// request timed out would otherwise be read as the next response.
    fn discard_pending(&mut self) -> impl Future<Output = ModbusResult<usize>> + Send;

    /// Check if the transport connection is active
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Get communication statistics
    fn get_stats(&self) -> TransportStats;
}

/// Transport layer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub errors: u64,
    pub timeouts: u64,
}

/// TCP transport carrying ASCII frames
pub struct TcpTransport {
    stream: Option<BufReader<TcpStream>>,
    pub address: SocketAddr,
    stats: TransportStats,
    /// Enable packet logging for debugging
    packet_logging: bool,
}

impl TcpTransport {
    /// Connect to a Modbus device
    pub async fn connect(address: SocketAddr) -> ModbusResult<Self> {
        Self::with_packet_logging(address, false).await
    }

    /// Connect with packet logging enabled or disabled
    pub async fn with_packet_logging(
        address: SocketAddr,
        enable_logging: bool,
    ) -> ModbusResult<Self> {
        let stream = TcpStream::connect(address).await.map_err(|e| {
            ModbusError::transport(format!("Failed to connect to {}: {}", address, e))
        })?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}", address);

        Ok(Self {
            stream: Some(BufReader::new(stream)),
            address,
            stats: TransportStats::default(),
            packet_logging: enable_logging,
        })
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    fn record_discard(
        &mut self,
        protocol: &str,
        result: std::io::Result<usize>,
    ) -> ModbusResult<usize> {
        match result {
            Ok(0) => Ok(0),
            Ok(discarded) => {
                self.stats.bytes_received += discarded as u64;
                debug!(
                    "[MODBUS-{}] Discarded {} stale bytes from {}",
                    protocol, discarded, self.address
                );
                Ok(discarded)
            }
            Err(e) => {
                self.stats.errors += 1;
                Err(ModbusError::transport(format!("Failed to receive: {}", e)))
            }
        }
    }

    fn stream_mut(&mut self) -> ModbusResult<&mut BufReader<TcpStream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| ModbusError::transport("TCP connection is closed"))
    }
}

impl ModbusTransport for TcpTransport {
    async fn send_all(&mut self, bytes: &[u8]) -> ModbusResult<()> {
        if self.packet_logging {
            log_packet("send", bytes, "ASCII-TCP");
        }

        let stream = self.stream_mut()?;
        let result = async {
            stream.get_mut().write_all(bytes).await?;
            stream.get_mut().flush().await
        }
        .await;

        match result {
            Ok(()) => {
                self.stats.frames_sent += 1;
                self.stats.bytes_sent += bytes.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.stats.errors += 1;
                warn!("TCP send to {} failed: {}", self.address, e);
                Err(ModbusError::transport(format!("Failed to send frame: {}", e)))
            }
        }
    }

    async fn receive_byte(&mut self, wait: Duration) -> ModbusResult<u8> {
        let stream = self.stream_mut()?;

        match timeout(wait, stream.read_u8()).await {
            Ok(Ok(byte)) => {
                self.stats.bytes_received += 1;
                if self.packet_logging {
                    log_packet("recv", &[byte], "ASCII-TCP");
                }
                Ok(byte)
            }
            Ok(Err(e)) => {
                self.stats.errors += 1;
                Err(ModbusError::transport(format!("Failed to receive: {}", e)))
            }
            Err(_) => {
                self.stats.timeouts += 1;
                Err(ModbusError::timeout("receive byte", wait.as_millis() as u64))
            }
        }
    }

    async fn discard_pending(&mut self) -> ModbusResult<usize> {
        let stream = self.stream_mut()?;
        let result = drain_ready(stream).await;
        self.record_discard("ASCII-TCP", result)
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.get_mut().shutdown().await?;
            debug!("Closed connection to {}", self.address);
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

/// Serial line transport carrying ASCII frames
///
/// Defaults follow the ASCII mode convention: 7 data bits, even parity,
/// 1 stop bit.
#[cfg(feature = "serial")]
pub struct SerialTransport {
    port: Option<tokio_serial::SerialStream>,
    port_name: String,
    stats: TransportStats,
    packet_logging: bool,
}

#[cfg(feature = "serial")]
impl SerialTransport {
    /// Open a serial port with ASCII defaults (7E1)
    pub fn open(port: &str, baud_rate: u32) -> ModbusResult<Self> {
        Self::open_with_config(
            port,
            baud_rate,
            tokio_serial::DataBits::Seven,
            tokio_serial::StopBits::One,
            tokio_serial::Parity::Even,
        )
    }

    /// Open a serial port with full configuration
    pub fn open_with_config(
        port: &str,
        baud_rate: u32,
        data_bits: tokio_serial::DataBits,
        stop_bits: tokio_serial::StopBits,
        parity: tokio_serial::Parity,
    ) -> ModbusResult<Self> {
        let builder = tokio_serial::new(port, baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity);

        let stream = tokio_serial::SerialStream::open(&builder).map_err(|e| {
            ModbusError::transport(format!("Failed to open serial port {}: {}", port, e))
        })?;

        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
            stats: TransportStats::default(),
            packet_logging: false,
        })
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    fn port_mut(&mut self) -> ModbusResult<&mut tokio_serial::SerialStream> {
        let name = &self.port_name;
        self.port
            .as_mut()
            .ok_or_else(|| ModbusError::transport(format!("Serial port {} is closed", name)))
    }
}

#[cfg(feature = "serial")]
impl ModbusTransport for SerialTransport {
    async fn send_all(&mut self, bytes: &[u8]) -> ModbusResult<()> {
        if self.packet_logging {
            log_packet("send", bytes, "ASCII-SERIAL");
        }

        let port = self.port_mut()?;
        let result = async {
            port.write_all(bytes).await?;
            port.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                self.stats.frames_sent += 1;
                self.stats.bytes_sent += bytes.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.stats.errors += 1;
                Err(ModbusError::transport(format!("Serial write failed: {}", e)))
            }
        }
    }

    async fn receive_byte(&mut self, wait: Duration) -> ModbusResult<u8> {
        let port = self.port_mut()?;

        match timeout(wait, port.read_u8()).await {
            Ok(Ok(byte)) => {
                self.stats.bytes_received += 1;
                if self.packet_logging {
                    log_packet("recv", &[byte], "ASCII-SERIAL");
                }
                Ok(byte)
            }
            Ok(Err(e)) => {
                self.stats.errors += 1;
                Err(ModbusError::transport(format!("Serial read failed: {}", e)))
            }
            Err(_) => {
                self.stats.timeouts += 1;
                Err(ModbusError::timeout("receive byte", wait.as_millis() as u64))
            }
        }
    }

    async fn discard_pending(&mut self) -> ModbusResult<usize> {
        let port = self.port_mut()?;
        let result = drain_ready(port).await;
        let discarded = result.map_err(|e| {
            self.stats.errors += 1;
            ModbusError::transport(format!("Serial read failed: {}", e))
        })?;
        if discarded > 0 {
            self.stats.bytes_received += discarded as u64;
            debug!("Discarded {} stale bytes on {}", discarded, self.port_name);
        }
        Ok(discarded)
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        // SerialStream closes on drop
        self.port.take();
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }
}
