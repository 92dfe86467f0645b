//! Exporter configuration.
//!
//! Devices are listed in a YAML file, by default `setting.yml` next to the
//! executable:
//!
//! ```yaml
//! Devices:
//!   - DevicePath: /dev/rfcomm0
//!     DeviceName: desk
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default settings file name.
pub const SETTINGS_FILE: &str = "setting.yml";

/// One configured device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Serial device path.
    #[serde(rename = "DevicePath")]
    pub device_path: String,
    /// Display name, exported as the `Name` label.
    #[serde(rename = "DeviceName")]
    pub device_name: String,
}

/// Exporter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Devices in polling order.
    #[serde(rename = "Devices")]
    pub devices: Vec<DeviceConfig>,
}

impl Settings {
    /// Parses and validates settings from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a file.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("loading settings from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_yaml(&text)
    }

    /// Returns the settings path next to the running executable.
    pub fn default_path() -> Result<PathBuf> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().ok_or_else(|| Error::Config {
            message: format!("executable {} has no parent directory", exe.display()),
        })?;
        Ok(dir.join(SETTINGS_FILE))
    }

    fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(Error::Config {
                message: "no devices configured".into(),
            });
        }

        for (index, device) in self.devices.iter().enumerate() {
            if device.device_path.trim().is_empty() {
                return Err(Error::Config {
                    message: format!("device {index}: empty DevicePath"),
                });
            }
            if device.device_name.trim().is_empty() {
                return Err(Error::Config {
                    message: format!("device {index}: empty DeviceName"),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices_in_order() {
        let yaml = "\
Devices:
  - DevicePath: /dev/rfcomm0
    DeviceName: desk
  - DevicePath: /dev/rfcomm1
    DeviceName: fridge
";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.devices.len(), 2);
        assert_eq!(settings.devices[0].device_path, "/dev/rfcomm0");
        assert_eq!(settings.devices[0].device_name, "desk");
        assert_eq!(settings.devices[1].device_name, "fridge");
    }

    #[test]
    fn test_reject_empty_device_list() {
        let err = Settings::from_yaml("Devices: []\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_reject_blank_name() {
        let yaml = "Devices:\n  - DevicePath: /dev/rfcomm0\n    DeviceName: ' '\n";
        let err = Settings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("DeviceName"));
    }

    #[test]
    fn test_reject_malformed_yaml() {
        let err = Settings::from_yaml("Devices:\n  - DevicePath: [\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load(Path::new("/nonexistent/setting.yml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_default_path_file_name() {
        let path = Settings::default_path().unwrap();
        assert!(path.ends_with(SETTINGS_FILE));
    }
}
