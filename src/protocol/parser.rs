//! Binary data parsing for watt checker responses.

use bytes::Buf;

use crate::error::{Error, Result};
use crate::types::{DeviceTimestamp, Reading};

/// Length of the measurement data following the status byte.
pub const MEASUREMENT_DATA_LEN: usize = 15;

/// Parses the data of a `ReadMeasurement` response.
///
/// Format:
/// ```text
/// [current:3LE] [voltage:3LE] [power:3LE]
/// [sec:1] [min:1] [hour:1] [day:1] [month:1] [year-2000:1]
/// ```
///
/// Calendar fields are passed through as reported by the device.
pub fn parse_measurement(data: &[u8]) -> Result<Reading> {
    if data.len() < MEASUREMENT_DATA_LEN {
        return Err(Error::Protocol {
            message: format!("measurement too short: {} bytes", data.len()),
        });
    }

    let mut cursor = std::io::Cursor::new(data);

    let current_raw = cursor.get_uint_le(3) as u32;
    let voltage_raw = cursor.get_uint_le(3) as u32;
    let power_raw = cursor.get_uint_le(3) as u32;

    let second = cursor.get_u8();
    let minute = cursor.get_u8();
    let hour = cursor.get_u8();
    let day = cursor.get_u8();
    let month = cursor.get_u8();
    let year = cursor.get_u8();

    Ok(Reading::from_raw(
        DeviceTimestamp::from_device(year, month, day, hour, minute, second),
        voltage_raw,
        current_raw,
        power_raw,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn measurement(current: u32, voltage: u32, power: u32, clock: [u8; 6]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&current.to_le_bytes()[..3]);
        data.extend_from_slice(&voltage.to_le_bytes()[..3]);
        data.extend_from_slice(&power.to_le_bytes()[..3]);
        data.extend_from_slice(&clock);
        data
    }

    #[test]
    fn test_parse_measurement() {
        let data = measurement(128, 3300, 2000, [30, 15, 10, 5, 6, 23]);
        let reading = parse_measurement(&data).unwrap();

        assert!((reading.current_ma - 1.0).abs() < 1e-9);
        assert!((reading.voltage_v - 3.3).abs() < 1e-9);
        assert!((reading.power_w - 10.0).abs() < 1e-9);
        assert_eq!(
            reading.timestamp.to_datetime(),
            NaiveDate::from_ymd_opt(2023, 6, 5).and_then(|d| d.and_hms_opt(10, 15, 30))
        );
    }

    #[test]
    fn test_parse_full_scale() {
        let data = measurement(0x00ff_ffff, 0x00ff_ffff, 0x00ff_ffff, [0; 6]);
        let reading = parse_measurement(&data).unwrap();

        assert!((reading.current_ma - 16_777_215.0 / 128.0).abs() < 1e-6);
        assert!((reading.voltage_v - 16_777.215).abs() < 1e-6);
        assert!((reading.power_w - 83_886.075).abs() < 1e-6);
    }

    #[test]
    fn test_parse_little_endian_order() {
        // 0x030201 = 197121 mV
        let mut data = measurement(0, 0, 0, [0; 6]);
        data[3..6].copy_from_slice(&[0x01, 0x02, 0x03]);
        let reading = parse_measurement(&data).unwrap();
        assert!((reading.voltage_v - 197.121).abs() < 1e-9);
    }

    #[test]
    fn test_parse_passes_bad_calendar_through() {
        let data = measurement(0, 0, 0, [0, 0, 0, 0, 13, 0]);
        let reading = parse_measurement(&data).unwrap();
        assert_eq!(reading.timestamp.month, 13);
        assert_eq!(reading.timestamp.day, 0);
        assert_eq!(reading.timestamp.year, 2000);
        assert_eq!(reading.timestamp.to_datetime(), None);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let data = measurement(77, 101_000, 4321, [1, 2, 3, 4, 5, 6]);
        assert_eq!(
            parse_measurement(&data).unwrap(),
            parse_measurement(&data).unwrap()
        );
    }

    #[test]
    fn test_parse_too_short() {
        assert!(parse_measurement(&[0u8; 14]).is_err());
    }
}
