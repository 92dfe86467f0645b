//! Scripted in-memory transport.
//!
//! Replies are queued ahead of time and handed out to reads in order; every
//! byte written is recorded. Clones share the same script and write log, so a
//! test can keep a handle after moving the transport into a session.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Error;
use crate::protocol::{CommandCode, encode_frame};
use crate::transport::{Transport, TransportFuture};

#[derive(Debug)]
enum Delivery {
    Bytes(Vec<u8>),
    Failure(io::ErrorKind),
    // Times out, with `tail` showing up on the line right afterwards.
    Interrupted { tail: Vec<u8> },
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<Delivery>,
    pending: VecDeque<u8>,
    written: Vec<u8>,
    write_failure: Option<io::ErrorKind>,
    connected: bool,
    closed: bool,
}

/// Minimal fake transport used in tests to script device replies.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    chunk_size: usize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a connected transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                connected: true,
                ..MockState::default()
            })),
            chunk_size: usize::MAX,
        }
    }

    /// Limits every read and write to at most `size` bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queues raw bytes for the next reply.
    pub fn push_reply(&self, bytes: Vec<u8>) {
        self.state().replies.push_back(Delivery::Bytes(bytes));
    }

    /// Queues a well-formed response frame for `command`.
    pub fn push_response(&self, command: CommandCode, status: u8, data: &[u8]) {
        let mut payload = vec![u8::from(command), status];
        payload.extend_from_slice(data);
        let frame = encode_frame(&payload).map(|f| f.to_vec()).unwrap_or_default();
        self.push_reply(frame);
    }

    /// Queues a read failure.
    pub fn push_read_error(&self, kind: io::ErrorKind) {
        self.state().replies.push_back(Delivery::Failure(kind));
    }

    /// Queues a reply that stops after `head`, times out, and then delivers
    /// `tail` late.
    pub fn push_interrupted_reply(&self, head: &[u8], tail: &[u8]) {
        let mut state = self.state();
        state.replies.push_back(Delivery::Bytes(head.to_vec()));
        state.replies.push_back(Delivery::Interrupted {
            tail: tail.to_vec(),
        });
    }

    /// Number of received bytes not yet read.
    #[must_use]
    pub fn pending_input(&self) -> usize {
        self.state().pending.len()
    }

    /// Makes the next write fail.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        self.state().write_failure = Some(kind);
    }

    /// All bytes written so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.state().written.clone()
    }

    /// Written bytes split into frames using their length field.
    #[must_use]
    pub fn frames(&self) -> Vec<Vec<u8>> {
        let written = self.written();
        let mut frames = Vec::new();
        let mut rest = written.as_slice();

        while rest.len() >= 3 {
            let size = usize::from(u16::from_le_bytes([rest[1], rest[2]])) + 4;
            let end = size.min(rest.len());
            frames.push(rest[..end].to_vec());
            rest = &rest[end..];
        }

        frames
    }

    /// Number of command frames sent to the device.
    #[must_use]
    pub fn exchanges(&self) -> usize {
        self.frames().len()
    }

    /// Number of scripted replies not yet consumed.
    #[must_use]
    pub fn remaining_replies(&self) -> usize {
        self.state().replies.len()
    }

    /// Returns true once `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.connected = true;
            state.closed = false;
            Ok(())
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.connected = false;
            state.closed = true;
            Ok(())
        })
    }

    fn write<'a>(&'a mut self, data: &'a [u8]) -> TransportFuture<'a, usize> {
        let chunk_size = self.chunk_size;
        Box::pin(async move {
            let mut state = self.state();
            if !state.connected {
                return Err(Error::NotConnected);
            }
            if let Some(kind) = state.write_failure.take() {
                return Err(Error::Io(kind.into()));
            }

            let n = data.len().min(chunk_size);
            state.written.extend_from_slice(&data[..n]);
            Ok(n)
        })
    }

    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> TransportFuture<'a, usize> {
        let chunk_size = self.chunk_size;
        Box::pin(async move {
            let mut state = self.state();
            if !state.connected {
                return Err(Error::NotConnected);
            }

            if state.pending.is_empty() {
                match state.replies.pop_front() {
                    Some(Delivery::Bytes(bytes)) => state.pending.extend(bytes),
                    Some(Delivery::Failure(kind)) => return Err(Error::Io(kind.into())),
                    Some(Delivery::Interrupted { tail }) => {
                        state.pending.extend(tail);
                        return Err(Error::Timeout { timeout_ms: 0 });
                    }
                    None => return Err(Error::Timeout { timeout_ms: 0 }),
                }
            }

            let n = buf.len().min(chunk_size).min(state.pending.len());
            for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        })
    }

    fn discard_input(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.state().pending.clear();
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_scripts_reads_and_writes() {
        let mut mock = MockTransport::new();
        let handle = mock.clone();
        mock.push_reply(vec![1, 2, 3]);
        mock.push_read_error(io::ErrorKind::TimedOut);

        let mut buf = [0u8; 8];
        assert_eq!(mock.read(&mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert!(mock.read(&mut buf).await.is_err());

        mock.write(&[0xaa, 0x01, 0x00, 0x08, 0xb3]).await.unwrap();
        assert_eq!(handle.exchanges(), 1);
        assert_eq!(handle.frames()[0], vec![0xaa, 0x01, 0x00, 0x08, 0xb3]);
    }

    #[tokio::test]
    async fn test_mock_rejects_io_after_close() {
        let mut mock = MockTransport::new();
        mock.close().await.unwrap();
        assert!(mock.is_closed());
        assert!(!mock.is_connected());
        assert!(matches!(
            mock.write(&[0]).await,
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn test_push_response_builds_frame() {
        let mock = MockTransport::new();
        mock.push_response(CommandCode::StartMeasurement, 0x00, &[]);
        let state = mock.state();
        assert!(matches!(
            state.replies.front(),
            Some(Delivery::Bytes(reply)) if reply == &[0xaa, 0x02, 0x00, 0x02, 0x00, 0xab]
        ));
    }

    #[tokio::test]
    async fn test_interrupted_reply_leaves_tail_until_discarded() {
        let mut mock = MockTransport::new();
        mock.push_interrupted_reply(&[0xaa, 0x02], &[0x00, 0x02, 0x00, 0xab]);

        let mut buf = [0u8; 6];
        assert_eq!(mock.read(&mut buf).await.unwrap(), 2);
        assert!(matches!(
            mock.read(&mut buf[2..]).await,
            Err(Error::Timeout { .. })
        ));
        assert_eq!(mock.pending_input(), 4);

        mock.discard_input().await.unwrap();
        assert_eq!(mock.pending_input(), 0);
        assert_eq!(mock.remaining_replies(), 0);
    }
}
