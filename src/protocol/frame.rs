//! Frame encoding and response validation for the watt checker protocol.
//!
//! Both directions use the same framing:
//! ```text
//! ┌──────────┬──────────────┬─────────────────┬──────────┐
//! │  0xaa    │  size (LE)   │    payload      │  crc-8   │
//! │  1 byte  │   2 bytes    │   size bytes    │  1 byte  │
//! └──────────┴──────────────┴─────────────────┴──────────┘
//! ```
//!
//! In a response the payload starts with the echoed command code followed by
//! a status byte.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, FrameError, Result};
use crate::protocol::checksum::checksum;
use crate::protocol::command::CommandCode;

/// Frame header byte.
pub const FRAME_HEADER: u8 = 0xaa;

/// Maximum frame payload size (64KB - 1).
pub const MAX_FRAME_SIZE: usize = 65535;

/// Bytes a frame adds around its payload (header, length, checksum).
pub const FRAME_OVERHEAD: usize = 4;

/// Smallest response that carries a status byte.
pub const MIN_RESPONSE_SIZE: usize = 5;

/// Offset of the echoed command code in a response.
const COMMAND_OFFSET: usize = 3;

/// Offset of the status byte in a response.
const STATUS_OFFSET: usize = 4;

/// Status byte reported for a successful command.
pub const STATUS_OK: u8 = 0x00;

/// Encodes a payload into a command frame.
///
/// # Errors
///
/// Returns `FrameError::TooLarge` if the payload length does not fit the
/// 16-bit length field.
pub fn encode(payload: &[u8]) -> std::result::Result<Bytes, FrameError> {
    let size = u16::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        size: payload.len(),
        max: MAX_FRAME_SIZE,
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
    buf.put_u8(FRAME_HEADER);
    buf.put_u16_le(size);
    buf.put_slice(payload);
    buf.put_u8(checksum(payload));
    Ok(buf.freeze())
}

/// A response frame that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    raw: Bytes,
}

impl ResponseFrame {
    /// Command code echoed by the device.
    #[must_use]
    pub fn command_byte(&self) -> u8 {
        self.raw[COMMAND_OFFSET]
    }

    /// Status byte reported by the device.
    #[must_use]
    pub fn status(&self) -> u8 {
        self.raw[STATUS_OFFSET]
    }

    /// Command specific data between the status byte and the checksum.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.raw[STATUS_OFFSET + 1..self.raw.len() - 1]
    }

    /// Checksum byte carried by the frame.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        self.raw[self.raw.len() - 1]
    }

    /// Checksum recomputed over the frame payload.
    #[must_use]
    pub fn computed_checksum(&self) -> u8 {
        checksum(&self.raw[COMMAND_OFFSET..self.raw.len() - 1])
    }

    /// Returns true if the carried checksum matches the payload.
    #[must_use]
    pub fn checksum_matches(&self) -> bool {
        self.checksum() == self.computed_checksum()
    }

    /// Verifies the carried checksum.
    pub fn verify_checksum(&self) -> std::result::Result<(), FrameError> {
        if self.checksum_matches() {
            Ok(())
        } else {
            Err(FrameError::ChecksumMismatch {
                received: self.checksum(),
                computed: self.computed_checksum(),
            })
        }
    }
}

/// Validates a response to `command`.
///
/// The response must be exactly `command.response_len()` bytes long and
/// carry a zero status byte. The checksum is left to the caller, see
/// [`ResponseFrame::verify_checksum`].
pub fn validate_response(buf: &[u8], command: CommandCode) -> Result<ResponseFrame> {
    if buf.len() < MIN_RESPONSE_SIZE {
        return Err(FrameError::TooShort {
            min: MIN_RESPONSE_SIZE,
            got: buf.len(),
        }
        .into());
    }

    let expected = command.response_len();
    if buf.len() != expected {
        return Err(Error::ShortResponse {
            expected,
            got: buf.len(),
        });
    }

    let status = buf[STATUS_OFFSET];
    if status != STATUS_OK {
        return Err(Error::Status {
            command,
            code: status,
        });
    }

    match CommandCode::from_byte(buf[COMMAND_OFFSET]) {
        Some(echoed) if echoed == command => {}
        Some(echoed) => tracing::warn!("{:?} response echoes {:?}", command, echoed),
        None => tracing::warn!(
            "{:?} response echoes unknown command {:#04x}",
            command,
            buf[COMMAND_OFFSET]
        ),
    }

    Ok(ResponseFrame {
        raw: Bytes::copy_from_slice(buf),
    })
}
