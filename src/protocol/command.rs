//! Command codes and payloads for the watt checker protocol.
//!
//! Every command payload starts with its code byte, optionally followed by
//! parameters. Responses have a fixed length per command.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::FrameError;
use crate::protocol::frame::{self, FRAME_OVERHEAD};

/// Command codes sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    /// Set the device real-time clock.
    ClockSet = 0x01,
    /// Arm the measurement loop.
    StartMeasurement = 0x02,
    /// Request one real-time measurement snapshot.
    ReadMeasurement = 0x08,
}

impl CommandCode {
    /// Attempts to parse a command code from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::ClockSet),
            0x02 => Some(Self::StartMeasurement),
            0x08 => Some(Self::ReadMeasurement),
            _ => None,
        }
    }

    /// Payload length of the request, including the code byte.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::ClockSet => 8,
            Self::StartMeasurement => 2,
            Self::ReadMeasurement => 1,
        }
    }

    /// Length of the encoded request frame.
    #[must_use]
    pub const fn request_len(self) -> usize {
        self.payload_len() + FRAME_OVERHEAD
    }

    /// Length of the response frame the device sends back.
    #[must_use]
    pub const fn response_len(self) -> usize {
        match self {
            Self::ClockSet | Self::StartMeasurement => 2 + FRAME_OVERHEAD,
            Self::ReadMeasurement => 17 + FRAME_OVERHEAD,
        }
    }
}

impl From<CommandCode> for u8 {
    fn from(cmd: CommandCode) -> Self {
        cmd as Self
    }
}

/// Measurement mode for `StartMeasurement`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MeasurementMode {
    /// Regular measurement.
    #[default]
    Normal = 0x00,
    /// Accelerated test mode.
    Accelerated = 0xff,
}

impl From<MeasurementMode> for u8 {
    fn from(mode: MeasurementMode) -> Self {
        mode as Self
    }
}

/// A request to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set the device clock to the given local time.
    ClockSet(NaiveDateTime),
    /// Start measuring in the given mode.
    StartMeasurement(MeasurementMode),
    /// Read the current measurement.
    ReadMeasurement,
}

impl Command {
    /// Returns the command code.
    #[must_use]
    pub const fn code(&self) -> CommandCode {
        match self {
            Self::ClockSet(_) => CommandCode::ClockSet,
            Self::StartMeasurement(_) => CommandCode::StartMeasurement,
            Self::ReadMeasurement => CommandCode::ReadMeasurement,
        }
    }

    /// Builds the command payload.
    ///
    /// Clock payload: `[code] [sec] [min] [hour] [day] [month] [year % 100]
    /// [weekday, 0 = Sunday]`.
    #[must_use]
    pub fn payload(&self) -> Bytes {
        let code = self.code();
        let mut buf = BytesMut::with_capacity(code.payload_len());
        buf.put_u8(code.into());

        match self {
            Self::ClockSet(time) => {
                buf.put_u8(time.second() as u8);
                buf.put_u8(time.minute() as u8);
                buf.put_u8(time.hour() as u8);
                buf.put_u8(time.day() as u8);
                buf.put_u8(time.month() as u8);
                buf.put_u8(time.year().rem_euclid(100) as u8);
                buf.put_u8(time.weekday().num_days_from_sunday() as u8);
            }
            Self::StartMeasurement(mode) => buf.put_u8((*mode).into()),
            Self::ReadMeasurement => {}
        }

        buf.freeze()
    }

    /// Encodes the command into a complete frame.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        frame::encode(&self.payload())
    }
}
