//! Serial transport implementation.
//!
//! The watt checker is reached through a serial device, typically an RFCOMM
//! port bound to the meter's Bluetooth SPP channel.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, Parity, SerialPort, SerialPortBuilderExt, SerialStream};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportFuture};

/// Default baud rate for the watt checker.
pub const DEFAULT_BAUD_RATE: u32 = 19_200;

/// Default timeout for every read and write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/rfcomm0").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Parity.
    pub parity: Parity,
    /// Timeout applied to each read and write.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::Even,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the parity.
    #[must_use]
    pub const fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Sets the read/write timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial transport for watt checker communication.
pub struct SerialTransport {
    config: SerialConfig,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Creates a new serial transport with the given configuration.
    #[must_use]
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    /// Creates a new serial transport for the given port with default settings.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }
}

/// Runs an I/O future, turning an elapsed timeout into `Error::Timeout`.
async fn with_timeout<T>(timeout: Duration, fut: impl Future<Output = io::Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(Error::Io),
        Err(_) => Err(Error::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.stream.is_some() {
                return Ok(());
            }

            tracing::info!("connecting to serial port: {}", self.config.port);

            let stream = tokio_serial::new(&self.config.port, self.config.baud_rate)
                .parity(self.config.parity)
                .timeout(self.config.timeout)
                .open_native_async()
                .map_err(Error::Serial)?;

            // Stale bytes from an earlier session would shift every response
            if let Err(e) = stream.clear(ClearBuffer::All) {
                tracing::warn!("failed to clear serial buffers: {}", e);
            }

            self.stream = Some(stream);
            tracing::info!("connected to serial port");
            Ok(())
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.stream.take().is_some() {
                tracing::info!("closed serial port: {}", self.config.port);
            }
            Ok(())
        })
    }

    fn write<'a>(&'a mut self, data: &'a [u8]) -> TransportFuture<'a, usize> {
        Box::pin(async move {
            let timeout = self.config.timeout;
            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

            let n = with_timeout(timeout, stream.write(data)).await?;
            with_timeout(timeout, stream.flush()).await?;
            tracing::trace!("wrote {} bytes", n);
            Ok(n)
        })
    }

    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> TransportFuture<'a, usize> {
        Box::pin(async move {
            let timeout = self.config.timeout;
            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

            let n = with_timeout(timeout, stream.read(buf)).await?;
            tracing::trace!("received {} bytes", n);
            Ok(n)
        })
    }

    fn discard_input(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let stream = self.stream.as_ref().ok_or(Error::NotConnected)?;
            stream.clear(ClearBuffer::Input).map_err(Error::Serial)?;
            tracing::trace!("discarded serial input");
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/rfcomm0");
        assert_eq!(config.port, "/dev/rfcomm0");
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyUSB0")
            .baud_rate(115_200)
            .parity(Parity::None)
            .timeout(Duration::from_secs(1));
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_io_before_connect() {
        let mut transport = SerialTransport::with_port("/dev/null");
        assert!(!transport.is_connected());
        let mut buf = [0u8; 4];
        assert!(matches!(
            transport.read(&mut buf).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_discard_before_connect() {
        let mut transport = SerialTransport::with_port("/dev/null");
        assert!(matches!(
            transport.discard_input().await,
            Err(Error::NotConnected)
        ));
    }
}
