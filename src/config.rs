use crate::control::AltitudeCompensation;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_DT: f64 = 0.001;
pub const DEFAULT_GRAVITY: f64 = 9.81;
pub const DEFAULT_MASS: f64 = 0.3;
pub const DEFAULT_BODY: &str = "quadrotor";

/// Controller configuration.
///
/// Every field has a default matching the stock hover demo, so an empty TOML
/// document (or no file at all) gives the reference tuning:
///
/// ```toml
/// dt = 0.001
/// mass = 0.3
/// setpoint = [0.5, 0.0, 0.0, 0.0]
/// kp = [4.0, 0.01, 0.01, 0.01]
/// kd = [0.01, 0.01, 0.01, 0.01]
/// altitude_compensation = "doubled"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Control and simulation step (s)
    pub dt: f64,
    /// Gravitational acceleration (m/s²)
    pub gravity: f64,
    /// Vehicle mass used for weight compensation (kg)
    pub mass: f64,
    /// Name of the controlled body in the simulator
    pub body: String,
    /// Desired [altitude, roll, pitch, yaw]
    pub setpoint: [f64; 4],
    /// Proportional gains, diagonal of K_p
    pub kp: [f64; 4],
    /// Derivative gains, diagonal of K_d
    pub kd: [f64; 4],
    /// Rotor moment arm L (m)
    pub arm_length: f64,
    /// Yaw drag constant C
    pub yaw_drag: f64,
    pub altitude_compensation: AltitudeCompensation,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            gravity: DEFAULT_GRAVITY,
            mass: DEFAULT_MASS,
            body: DEFAULT_BODY.to_string(),
            setpoint: [0.5, 0.0, 0.0, 0.0],
            kp: [4.0, 0.01, 0.01, 0.01],
            kd: [0.01, 0.01, 0.01, 0.01],
            arm_length: 0.1,
            yaw_drag: 0.1,
            altitude_compensation: AltitudeCompensation::default(),
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    ///
    /// # Arguments
    ///
    /// * `s` - TOML text; missing keys take their defaults, unknown keys are rejected
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Parsed and validated configuration
    /// * `Err(Error::ConfigParse)` - Malformed TOML or an unknown key
    /// * `Err(Error::InvalidConfig)` - A value failed [`Config::validate`]
    ///
    /// # Example
    ///
    /// let config = Config::from_toml_str("kp = [2.0, 0.01, 0.01, 0.01]")?;
    /// assert_eq!(config.kp[0], 2.0);
    /// assert_eq!(config.dt, DEFAULT_DT);
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML config file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Parsed and validated configuration
    /// * `Err(Error::Io)` - The file could not be read; the error carries the path
    /// * `Err(Error::ConfigParse)` or `Err(Error::InvalidConfig)` - As for
    ///   [`Config::from_toml_str`]
    ///
    /// # Example
    ///
    /// let config = Config::load("gains.toml")?;
    /// let controller = AttitudeAltitudeController::from_config(&config)?;
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks every value is in range.
    ///
    /// `dt`, `mass`, `arm_length` and `yaw_drag` must be finite and positive.
    /// `gravity`, `setpoint` and the gains must be finite. `body` must not be
    /// empty.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - All values are usable
    /// * `Err(Error::InvalidConfig)` - Names the first offending field and its value
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("dt", self.dt),
            ("mass", self.mass),
            ("arm_length", self.arm_length),
            ("yaw_drag", self.yaw_drag),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be finite and > 0, got {}",
                    name, value
                )));
            }
        }

        if !self.gravity.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "gravity must be finite, got {}",
                self.gravity
            )));
        }

        let vectors = [
            ("setpoint", &self.setpoint),
            ("kp", &self.kp),
            ("kd", &self.kd),
        ];
        for (name, values) in vectors {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be finite, got {:?}",
                    name, values
                )));
            }
        }

        if self.body.is_empty() {
            return Err(Error::InvalidConfig("body name is empty".to_string()));
        }

        Ok(())
    }
}
