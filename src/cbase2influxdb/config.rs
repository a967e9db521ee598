// cbase2influxdb - CBase photovoltaic forecast collector for InfluxDB
//
// Copyright 2024 The cbase2influxdb Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use serde::Deserialize;
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DEFAULT_INFLUXDB_PORT: u16 = 8086;
const DEFAULT_INFLUXDB_DATABASE: &str = "cbase";

#[derive(Debug)]
pub enum ConfigError {
    Read(PathBuf, io::Error),
    Parse(serde_yaml::Error),
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(path, e) => write!(f, "unable to read {}: {}", path.display(), e),
            Self::Parse(e) => write!(f, "{}", e),
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{} value {} out of range [{}, {}]", field, value, min, max),
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Read(_, e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::OutOfRange { .. } => None,
        }
    }
}

/// Panel tracking mode, carried on the wire as its integer code (0-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum Tracking {
    Fixed,
    YAxis,
    XAxis,
    DualAxis,
}

impl Default for Tracking {
    fn default() -> Self {
        Tracking::Fixed
    }
}

impl TryFrom<u8> for Tracking {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Tracking::Fixed),
            1 => Ok(Tracking::YAxis),
            2 => Ok(Tracking::XAxis),
            3 => Ok(Tracking::DualAxis),
            other => Err(format!("invalid tracking mode {}, expected 0-3", other)),
        }
    }
}

impl From<Tracking> for u8 {
    fn from(tracking: Tracking) -> u8 {
        match tracking {
            Tracking::Fixed => 0,
            Tracking::YAxis => 1,
            Tracking::XAxis => 2,
            Tracking::DualAxis => 3,
        }
    }
}

/// Physical parameters of the PV install, sent to the CBase API with
/// every forecast request.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemParams {
    pub latitude: f64,
    pub longitude: f64,
    pub slope: u32,
    pub azimuth: u32,
    #[serde(default)]
    pub tracking: Tracking,
    pub panel_output: u32,
    pub panel_quantity: u32,
    #[serde(default)]
    pub inverter_capacity: u32,
}

impl SystemParams {
    /// Serialize every parameter under its wire name, in the order the
    /// API documents them. This is the only place request aliases live.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("lat", self.latitude.to_string()),
            ("lon", self.longitude.to_string()),
            ("slope", self.slope.to_string()),
            ("azi", self.azimuth.to_string()),
            ("tracking", u8::from(self.tracking).to_string()),
            ("panel_out", self.panel_output.to_string()),
            ("panel_qty", self.panel_quantity.to_string()),
            ("inv_cap", self.inverter_capacity.to_string()),
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range("cbase.system.latitude", self.latitude, -90.0, 90.0)?;
        check_range("cbase.system.longitude", self.longitude, -180.0, 180.0)?;
        check_range("cbase.system.slope", f64::from(self.slope), 0.0, 90.0)?;
        check_range("cbase.system.azimuth", f64::from(self.azimuth), 0.0, 359.0)?;
        check_range("cbase.system.panel_output", f64::from(self.panel_output), 0.0, 1000.0)?;
        check_range(
            "cbase.system.panel_quantity",
            f64::from(self.panel_quantity),
            0.0,
            1000.0,
        )?;
        check_range(
            "cbase.system.inverter_capacity",
            f64::from(self.inverter_capacity),
            0.0,
            100000.0,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfluxDbConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub retention_policy: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_INFLUXDB_PORT
}

fn default_database() -> String {
    DEFAULT_INFLUXDB_DATABASE.to_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CbaseConfig {
    pub api_host: String,
    pub system: SystemParams,
}

/// Application configuration, loaded once at startup from a YAML file
/// with two top-level keys: `influxdb` and `cbase`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub influxdb: InfluxDbConfig,
    pub cbase: CbaseConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(text).map_err(ConfigError::Parse)?;
        config.cbase.system.validate()?;
        Ok(config)
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value < min || value > max {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, Tracking};

    const FULL_CONFIG: &str = "
influxdb:
  host: influxdb.local
  port: 8087
  database: forecasts
  retention_policy: rp_30d
cbase:
  api_host: api.cbase.example
  system:
    latitude: 57.7
    longitude: 11.9
    slope: 27
    azimuth: 180
    tracking: 1
    panel_output: 405
    panel_quantity: 10
    inverter_capacity: 4000
";

    const MINIMAL_CONFIG: &str = "
influxdb:
  host: influxdb.local
cbase:
  api_host: api.cbase.example
  system:
    latitude: 57.7
    longitude: 11.9
    slope: 27
    azimuth: 180
    panel_output: 405
    panel_quantity: 10
";

    #[test]
    fn test_from_yaml_full() {
        let config = AppConfig::from_yaml(FULL_CONFIG).unwrap();

        assert_eq!(config.influxdb.host, "influxdb.local");
        assert_eq!(config.influxdb.port, 8087);
        assert_eq!(config.influxdb.database, "forecasts");
        assert_eq!(config.influxdb.retention_policy.as_deref(), Some("rp_30d"));
        assert_eq!(config.cbase.api_host, "api.cbase.example");
        assert_eq!(config.cbase.system.tracking, Tracking::YAxis);
        assert_eq!(config.cbase.system.inverter_capacity, 4000);
    }

    #[test]
    fn test_from_yaml_defaults() {
        let config = AppConfig::from_yaml(MINIMAL_CONFIG).unwrap();

        assert_eq!(config.influxdb.port, 8086);
        assert_eq!(config.influxdb.database, "cbase");
        assert_eq!(config.influxdb.retention_policy, None);
        assert_eq!(config.cbase.system.tracking, Tracking::Fixed);
        assert_eq!(config.cbase.system.inverter_capacity, 0);
    }

    #[test]
    fn test_from_yaml_latitude_out_of_range() {
        let text = MINIMAL_CONFIG.replace("latitude: 57.7", "latitude: 95");
        let err = AppConfig::from_yaml(&text).unwrap_err();

        match err {
            ConfigError::OutOfRange { field, value, .. } => {
                assert_eq!(field, "cbase.system.latitude");
                assert_eq!(value, 95.0);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_from_yaml_azimuth_out_of_range() {
        let text = MINIMAL_CONFIG.replace("azimuth: 180", "azimuth: 360");
        let err = AppConfig::from_yaml(&text).unwrap_err();

        assert!(err.to_string().contains("cbase.system.azimuth"));
    }

    #[test]
    fn test_from_yaml_longitude_accepts_full_range() {
        let text = MINIMAL_CONFIG.replace("longitude: 11.9", "longitude: -150.5");
        let config = AppConfig::from_yaml(&text).unwrap();

        assert_eq!(config.cbase.system.longitude, -150.5);
    }

    #[test]
    fn test_from_yaml_invalid_tracking_code() {
        let text = MINIMAL_CONFIG.replace("azimuth: 180", "azimuth: 180\n    tracking: 7");
        let err = AppConfig::from_yaml(&text).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("tracking"));
    }

    #[test]
    fn test_from_yaml_missing_required_key() {
        let text = MINIMAL_CONFIG.replace("  api_host: api.cbase.example\n", "");
        let err = AppConfig::from_yaml(&text).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_query_params_wire_names() {
        let config = AppConfig::from_yaml(FULL_CONFIG).unwrap();
        let params = config.cbase.system.query_params();

        assert_eq!(
            params,
            vec![
                ("lat", "57.7".to_owned()),
                ("lon", "11.9".to_owned()),
                ("slope", "27".to_owned()),
                ("azi", "180".to_owned()),
                ("tracking", "1".to_owned()),
                ("panel_out", "405".to_owned()),
                ("panel_qty", "10".to_owned()),
                ("inv_cap", "4000".to_owned()),
            ]
        );
    }
}
