//! Transport layer for watt checker communication.
//!
//! This module provides the abstraction over the byte stream the device is
//! reached through, plus the exact-length read and write loops the command
//! exchange is built on.

pub mod mock;
pub mod serial;

use std::future::Future;
use std::io;
use std::pin::Pin;

use crate::error::{Error, Result};

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Trait for transport implementations.
///
/// `write` and `read` may transfer fewer bytes than requested; use
/// [`write_exact`] and [`read_exact`] to move whole frames.
pub trait Transport: Send {
    /// Opens the underlying stream.
    fn connect(&mut self) -> TransportFuture<'_, ()>;

    /// Closes the underlying stream.
    fn close(&mut self) -> TransportFuture<'_, ()>;

    /// Writes some of `data`, returning the number of bytes accepted.
    fn write<'a>(&'a mut self, data: &'a [u8]) -> TransportFuture<'a, usize>;

    /// Reads into `buf`, returning the number of bytes received.
    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> TransportFuture<'a, usize>;

    /// Drops any received bytes not yet read.
    fn discard_input(&mut self) -> TransportFuture<'_, ()>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;
}

/// Writes all of `data`.
///
/// Short writes count as progress and the loop continues; any error aborts
/// immediately without retrying.
pub async fn write_exact<T: Transport + ?Sized>(transport: &mut T, data: &[u8]) -> Result<usize> {
    let mut written = 0;

    while written < data.len() {
        let n = transport.write(&data[written..]).await?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "transport accepted no bytes",
            )));
        }
        written += n;
    }

    Ok(written)
}

/// Reads exactly `count` bytes into the front of `buf`.
///
/// Before every read the pending range is checked against the buffer and a
/// `BoundsViolation` is returned instead of reading out of range.
pub async fn read_exact<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
    count: usize,
) -> Result<usize> {
    let capacity = buf.len();
    let mut offset = 0;

    while offset < count {
        if offset >= capacity || count > capacity {
            return Err(Error::BoundsViolation {
                offset,
                count,
                capacity,
            });
        }

        let n = transport.read(&mut buf[offset..count]).await?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream closed after {offset} of {count} bytes"),
            )));
        }
        offset += n;
    }

    Ok(offset)
}

pub use mock::MockTransport;
pub use serial::SerialTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_exact_survives_short_writes() {
        let mut transport = MockTransport::new().with_chunk_size(2);
        let written = write_exact(&mut transport, &[1, 2, 3, 4, 5]).await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(transport.written(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_write_exact_aborts_on_error() {
        let mut transport = MockTransport::new();
        transport.fail_next_write(io::ErrorKind::BrokenPipe);
        let err = write_exact(&mut transport, &[1, 2, 3]).await.unwrap_err();
        assert!(err.is_io_failure());
        assert!(transport.written().is_empty());
    }

    #[tokio::test]
    async fn test_read_exact_accumulates() {
        let mut transport = MockTransport::new().with_chunk_size(3);
        transport.push_reply((0..10).collect());

        let mut buf = [0u8; 16];
        let n = read_exact(&mut transport, &mut buf, 10).await.unwrap();
        assert_eq!(n, 10);
        assert_eq!(&buf[..10], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(buf[10], 0);
    }

    #[tokio::test]
    async fn test_read_exact_bounds_violation() {
        let mut transport = MockTransport::new();
        transport.push_reply(vec![0; 32]);

        let mut buf = [0u8; 8];
        let err = read_exact(&mut transport, &mut buf, 21).await.unwrap_err();
        assert!(matches!(
            err,
            Error::BoundsViolation {
                offset: 0,
                count: 21,
                capacity: 8
            }
        ));
    }

    #[tokio::test]
    async fn test_read_exact_timeout_is_io_failure() {
        let mut transport = MockTransport::new();
        let mut buf = [0u8; 8];
        let err = read_exact(&mut transport, &mut buf, 6).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(err.is_io_failure());
    }

    #[tokio::test]
    async fn test_read_exact_zero_count() {
        let mut transport = MockTransport::new();
        let mut buf = [0u8; 4];
        assert_eq!(read_exact(&mut transport, &mut buf, 0).await.unwrap(), 0);
    }
}
