//! Device session and polling cache.
//!
//! A [`WattChecker`] owns one transport and the last good reading for one
//! device. All operations on a session are serialized through a single lock,
//! so concurrent scrapes of the same device never interleave frames on the
//! wire, while separate sessions proceed independently.

use std::fmt;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::commands::CommandHandler;
use crate::error::{Error, Result};
use crate::protocol::MeasurementMode;
use crate::transport::Transport;
use crate::types::Reading;

/// Minimum time between two device polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Readings younger than this are served from the cache.
    pub poll_interval: Duration,
    /// Measurement mode sent by `initialize`.
    pub mode: MeasurementMode,
    /// Reject responses whose checksum does not match.
    pub verify_checksum: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            mode: MeasurementMode::Normal,
            verify_checksum: false,
        }
    }
}

impl SessionConfig {
    /// Sets the poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the measurement mode.
    #[must_use]
    pub const fn mode(mut self, mode: MeasurementMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables response checksum verification.
    #[must_use]
    pub const fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Transport open, clock not yet set.
    Opened,
    /// Clock set, measurement not started.
    ClockSynced,
    /// Measurement running; reads are allowed.
    Measuring,
    /// Initialization failed; the device must not be polled.
    Failed,
    /// Session closed.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opened => "opened",
            Self::ClockSynced => "clock-synced",
            Self::Measuring => "measuring",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of [`WattChecker::collect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Reading fetched from the device by this call.
    Fresh(Reading),
    /// Reading served from the cache without device I/O.
    Cached(Reading),
    /// The poll failed.
    Unavailable,
}

impl Sample {
    /// Returns the reading, or the all-zero reading if the poll failed.
    #[must_use]
    pub fn reading(&self) -> Reading {
        match self {
            Self::Fresh(reading) | Self::Cached(reading) => *reading,
            Self::Unavailable => Reading::default(),
        }
    }

    /// Returns true if the sample carries a real reading.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

/// Last successful poll.
#[derive(Debug, Default)]
struct PollState {
    last_poll: Option<Instant>,
    last: Reading,
}

impl PollState {
    fn cached(&self, now: Instant, interval: Duration) -> Option<Reading> {
        let last_poll = self.last_poll?;
        (now.saturating_duration_since(last_poll) < interval).then_some(self.last)
    }

    fn record(&mut self, now: Instant, reading: Reading) {
        self.last_poll = Some(now);
        self.last = reading;
    }
}

struct Session<T> {
    commands: CommandHandler<T>,
    phase: Phase,
    poll: PollState,
}

impl<T> Session<T> {
    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Error::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }
}

/// Session with one watt checker.
pub struct WattChecker<T> {
    name: String,
    config: SessionConfig,
    session: Mutex<Session<T>>,
}

impl<T: Transport> WattChecker<T> {
    /// Creates a session on an already connected transport.
    ///
    /// The device is not contacted until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(name: impl Into<String>, transport: T, config: SessionConfig) -> Self {
        let mut commands = CommandHandler::new(transport);
        commands.set_verify_checksum(config.verify_checksum);

        Self {
            name: name.into(),
            config,
            session: Mutex::new(Session {
                commands,
                phase: Phase::Opened,
                poll: PollState::default(),
            }),
        }
    }

    /// Returns the device display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the session settings.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the current phase.
    pub async fn phase(&self) -> Phase {
        self.session.lock().await.phase
    }

    /// Returns when the cached reading was obtained, if any.
    pub async fn last_poll(&self) -> Option<Instant> {
        self.session.lock().await.poll.last_poll
    }

    /// Synchronizes the device clock to local time and starts measuring.
    ///
    /// # Errors
    ///
    /// Any failure leaves the session in [`Phase::Failed`].
    pub async fn initialize(&self) -> Result<()> {
        tracing::info!("initializing watt checker {}", self.name);
        self.set_clock(Local::now().naive_local()).await?;
        self.start_measurement(self.config.mode).await?;
        tracing::info!("watt checker {} measuring", self.name);
        Ok(())
    }

    /// Sets the device clock. Only valid right after the session was opened.
    pub async fn set_clock(&self, time: NaiveDateTime) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_phase(Phase::Opened)?;

        match session.commands.set_clock(time).await {
            Ok(()) => {
                session.phase = Phase::ClockSynced;
                tracing::debug!("{}: clock set to {}", self.name, time);
                Ok(())
            }
            Err(e) => {
                session.phase = Phase::Failed;
                tracing::error!("{}: clock set failed: {}", self.name, e);
                Err(e)
            }
        }
    }

    /// Starts the measurement loop. Only valid after the clock was set.
    pub async fn start_measurement(&self, mode: MeasurementMode) -> Result<()> {
        let mut session = self.session.lock().await;
        session.expect_phase(Phase::ClockSynced)?;

        match session.commands.start_measurement(mode).await {
            Ok(()) => {
                session.phase = Phase::Measuring;
                tracing::debug!("{}: measurement started ({:?})", self.name, mode);
                Ok(())
            }
            Err(e) => {
                session.phase = Phase::Failed;
                tracing::error!("{}: start measurement failed: {}", self.name, e);
                Err(e)
            }
        }
    }

    /// Reads a measurement from the device, bypassing the cache.
    pub async fn read_measurement(&self) -> Result<Reading> {
        let mut session = self.session.lock().await;
        session.expect_phase(Phase::Measuring)?;
        session.commands.read_measurement().await
    }

    /// Returns the latest reading, polling the device at most once per
    /// poll interval.
    ///
    /// A failed poll yields [`Sample::Unavailable`] and leaves the cache
    /// untouched, so the next call contacts the device again.
    pub async fn collect(&self) -> Sample {
        let mut session = self.session.lock().await;

        if let Some(reading) = session.poll.cached(Instant::now(), self.config.poll_interval) {
            tracing::trace!("{}: serving cached reading", self.name);
            return Sample::Cached(reading);
        }

        let result = match session.expect_phase(Phase::Measuring) {
            Ok(()) => session.commands.read_measurement().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(reading) => {
                session.poll.record(Instant::now(), reading);
                tracing::debug!("{}: {}", self.name, reading);
                Sample::Fresh(reading)
            }
            Err(e) => {
                tracing::warn!("{}: measurement failed: {}", self.name, e);
                Sample::Unavailable
            }
        }
    }

    /// Power in watts, zero if the poll failed.
    pub async fn power_watts(&self) -> f64 {
        self.collect().await.reading().power_w
    }

    /// Voltage in volts, zero if the poll failed.
    pub async fn voltage_volts(&self) -> f64 {
        self.collect().await.reading().voltage_v
    }

    /// Current in milliamps, zero if the poll failed.
    pub async fn current_milliamps(&self) -> f64 {
        self.collect().await.reading().current_ma
    }

    /// Closes the transport. Later commands fail with `InvalidPhase`.
    pub async fn close(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.phase == Phase::Closed {
            return Ok(());
        }

        session.phase = Phase::Closed;
        session.poll = PollState::default();
        session.commands.transport_mut().close().await?;
        tracing::info!("closed watt checker {}", self.name);
        Ok(())
    }
}
