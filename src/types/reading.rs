//! Measurement types.

use chrono::{NaiveDate, NaiveDateTime};

/// Voltage resolution in millivolts per raw step.
pub const VOLTAGE_STEP_MV: f64 = 1.0;

/// Current resolution in milliamps per raw step.
pub const CURRENT_STEP_MA: f64 = 1.0 / 128.0;

/// Power resolution in milliwatts per raw step.
pub const POWER_STEP_MW: f64 = 5.0;

/// Base year for the device's two-digit year.
pub const YEAR_BASE: u16 = 2000;

/// Device clock at measurement time.
///
/// Fields are kept exactly as reported; a device whose clock was never set
/// can report impossible dates such as month 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeviceTimestamp {
    /// Full year (device year + 2000).
    pub year: u16,
    /// Month, 1-12 when valid.
    pub month: u8,
    /// Day of month, 1-31 when valid.
    pub day: u8,
    /// Hour, 0-23 when valid.
    pub hour: u8,
    /// Minute.
    pub minute: u8,
    /// Second.
    pub second: u8,
}

impl DeviceTimestamp {
    /// Builds a timestamp from the raw device fields.
    #[must_use]
    pub const fn from_device(
        year: u8,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Self {
        Self {
            year: YEAR_BASE + year as u16,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Converts to a calendar date and time.
    ///
    /// Returns `None` if the fields do not form a valid date.
    #[must_use]
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?
        .and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
    }
}

impl std::fmt::Display for DeviceTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// One decoded measurement.
///
/// `Reading::default()` is the all-zero reading reported for failed polls.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    /// Device clock when the measurement was taken.
    pub timestamp: DeviceTimestamp,
    /// Voltage in volts.
    pub voltage_v: f64,
    /// Current in milliamps.
    pub current_ma: f64,
    /// Power in watts.
    pub power_w: f64,
}

impl Reading {
    /// Scales raw 24-bit device values into physical units.
    #[must_use]
    pub fn from_raw(timestamp: DeviceTimestamp, voltage: u32, current: u32, power: u32) -> Self {
        Self {
            timestamp,
            voltage_v: f64::from(voltage) * VOLTAGE_STEP_MV / 1000.0,
            current_ma: f64::from(current) * CURRENT_STEP_MA,
            power_w: f64::from(power) * POWER_STEP_MW / 1000.0,
        }
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} voltage = {:3.2}V, current = {:4.2}mA, power = {:4.2}W",
            self.timestamp, self.voltage_v, self.current_ma, self.power_w
        )
    }
}
