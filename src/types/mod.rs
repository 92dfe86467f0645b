//! Data types for watt checker measurements.

pub mod reading;

pub use reading::{
    CURRENT_STEP_MA, DeviceTimestamp, POWER_STEP_MW, Reading, VOLTAGE_STEP_MV, YEAR_BASE,
};
