//! Command handlers for watt checker operations.
//!
//! This module runs the request/response exchange for each command: encode
//! the frame, write it, read the fixed-length response and validate it.
//! Exchanges are strictly sequential; a new command is only written after the
//! previous response was read in full or the exchange failed. A failed
//! exchange discards whatever is left in the receive buffer, so a late tail of
//! an abandoned response is never read as the start of the next one.

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::protocol::{
    Command, MeasurementMode, ResponseFrame, parse_measurement, validate_response,
};
use crate::transport::{Transport, read_exact, write_exact};
use crate::types::Reading;

/// Size of the receive buffer used for a single response.
pub const RECEIVE_BUFFER_SIZE: usize = 256;

/// Command handler for watt checker operations.
pub struct CommandHandler<T> {
    transport: T,
    verify_checksum: bool,
}

impl<T: Transport> CommandHandler<T> {
    /// Creates a new command handler.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            verify_checksum: false,
        }
    }

    /// Enables or disables response checksum verification.
    pub fn set_verify_checksum(&mut self, verify: bool) {
        self.verify_checksum = verify;
    }

    /// Returns the underlying transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends a command and reads back its validated response.
    async fn exchange(&mut self, command: Command) -> Result<ResponseFrame> {
        let code = command.code();
        let result = self.try_exchange(command).await;

        if let Err(e) = &result {
            tracing::debug!("{:?} failed, discarding pending input: {}", code, e);
            if self.transport.is_connected() {
                if let Err(discard_err) = self.transport.discard_input().await {
                    tracing::warn!("failed to discard input: {}", discard_err);
                }
            }
        }

        result
    }

    async fn try_exchange(&mut self, command: Command) -> Result<ResponseFrame> {
        let code = command.code();
        let request = command.encode()?;
        tracing::trace!("sending {:?}: {}", code, hex::encode(&request));

        write_exact(&mut self.transport, &request).await?;

        let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
        let n = read_exact(&mut self.transport, &mut buf, code.response_len()).await?;
        tracing::trace!("received {:?}: {}", code, hex::encode(&buf[..n]));

        let frame = validate_response(&buf[..n], code)?;
        if self.verify_checksum {
            frame.verify_checksum()?;
        }
        Ok(frame)
    }

    // ==================== Device Commands ====================

    /// Sets the device real-time clock.
    pub async fn set_clock(&mut self, time: NaiveDateTime) -> Result<()> {
        self.exchange(Command::ClockSet(time)).await?;
        Ok(())
    }

    /// Starts the measurement loop.
    pub async fn start_measurement(&mut self, mode: MeasurementMode) -> Result<()> {
        self.exchange(Command::StartMeasurement(mode)).await?;
        Ok(())
    }

    /// Reads one measurement snapshot.
    pub async fn read_measurement(&mut self) -> Result<Reading> {
        let frame = self.exchange(Command::ReadMeasurement).await?;
        parse_measurement(frame.data())
    }
}
