//! Protocol definitions for watt checker communication.
//!
//! This module contains the low-level protocol types including:
//! - Frame encoding and response validation
//! - The frame checksum
//! - Command codes and payloads
//! - Measurement parsing

pub mod checksum;
pub mod command;
pub mod frame;
pub mod parser;

pub use checksum::{CRC_8_WATTCHECKER, checksum};
pub use command::{Command, CommandCode, MeasurementMode};
pub use frame::{
    FRAME_HEADER, FRAME_OVERHEAD, MAX_FRAME_SIZE, MIN_RESPONSE_SIZE, ResponseFrame,
    encode as encode_frame, validate_response,
};
pub use parser::{MEASUREMENT_DATA_LEN, parse_measurement};
