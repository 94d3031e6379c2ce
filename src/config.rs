use crate::error::ConfigError;
use crate::gpio::PinId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SOUND_SPEED_MPS: f64 = 343.0;
pub const TRIGGER_PULSE: Duration = Duration::from_micros(10);
pub const SETTLE_DELAY: Duration = Duration::from_millis(60);
pub const RISING_EDGE_TIMEOUT: Duration = Duration::from_millis(20);

pub const DEFAULT_CONFIG_PATH: &str = "ultrasonic.json";

/// Pin binding of one sensor, resolved from the configuration maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    pub name: String,
    pub echo_pin: PinId,
    pub trig_pin: PinId,
}

/// Static configuration loaded once at startup.
///
/// Pin numbers use the BCM numbering understood by the Linux GPIO driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Sensor names in batch / CSV column order.
    pub sensors: Vec<String>,
    pub echo_pins: BTreeMap<String, PinId>,
    pub trig_pins: BTreeMap<String, PinId>,
    pub cutoff_range_mm: u32,
    pub sampling_times: usize,
    pub history_length: usize,
    pub output_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let layout: [(&str, PinId, PinId); 5] = [
            ("FrLH", 17, 18),
            ("Fr", 27, 23),
            ("FrRH", 22, 24),
            ("LH", 5, 25),
            ("RH", 6, 12),
        ];
        Self {
            sensors: layout.iter().map(|(name, _, _)| name.to_string()).collect(),
            echo_pins: layout
                .iter()
                .map(|(name, echo, _)| (name.to_string(), *echo))
                .collect(),
            trig_pins: layout
                .iter()
                .map(|(name, _, trig)| (name.to_string(), *trig))
                .collect(),
            cutoff_range_mm: 2000,
            sampling_times: 100,
            history_length: 3,
            output_path: PathBuf::from("records/ultrasonic_test.csv"),
        }
    }
}

impl Config {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty JSON, refusing to clobber an existing file.
    pub fn write_sample(&self, path: &Path) -> Result<(), ConfigError> {
        let to_write_error = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if path.exists() {
            return Err(to_write_error(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "file already exists",
            )));
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n").map_err(to_write_error)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensors.is_empty() {
            return Err(ConfigError::Invalid("no sensors configured".into()));
        }
        if self.cutoff_range_mm == 0 {
            return Err(ConfigError::Invalid("cutoff_range_mm must be positive".into()));
        }
        if self.history_length == 0 {
            return Err(ConfigError::Invalid("history_length must be at least 1".into()));
        }
        if self.sampling_times == 0 {
            return Err(ConfigError::Invalid("sampling_times must be at least 1".into()));
        }

        let mut names = HashSet::new();
        let mut pins = HashSet::new();
        for sensor in self.sensor_configs()? {
            if !names.insert(sensor.name.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "sensor {} listed twice",
                    sensor.name
                )));
            }
            for pin in [sensor.echo_pin, sensor.trig_pin] {
                if !pins.insert(pin) {
                    return Err(ConfigError::Invalid(format!(
                        "pin {pin} is assigned more than once (sensor {})",
                        sensor.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolves every listed sensor to its pin pair, in configured order.
    pub fn sensor_configs(&self) -> Result<Vec<SensorConfig>, ConfigError> {
        self.sensors
            .iter()
            .map(|name| {
                let missing = |role: &str| {
                    ConfigError::Invalid(format!("sensor {name} has no {role} pin"))
                };
                Ok(SensorConfig {
                    name: name.clone(),
                    echo_pin: *self.echo_pins.get(name).ok_or_else(|| missing("echo"))?,
                    trig_pin: *self.trig_pins.get(name).ok_or_else(|| missing("trig"))?,
                })
            })
            .collect()
    }

    /// Longest echo pulse worth waiting for, derived from the cutoff range.
    pub fn cutoff_round_trip(&self) -> Duration {
        Duration::from_secs_f64(self.cutoff_range_mm as f64 * 2.0 / 1000.0 / SOUND_SPEED_MPS)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Configuration ===")?;
        writeln!(f, "Sensors:          {}", self.sensors.join(", "))?;
        writeln!(f, "Cutoff range:     {} mm", self.cutoff_range_mm)?;
        writeln!(f, "Sampling times:   {}", self.sampling_times)?;
        writeln!(f, "History length:   {}", self.history_length)?;
        writeln!(f, "Output path:      {}", self.output_path.display())?;
        writeln!(f)?;
        writeln!(f, "=== Pin layout (BCM) ===")?;
        for name in &self.sensors {
            let pin = |map: &BTreeMap<String, PinId>| {
                map.get(name)
                    .map_or_else(|| "?".to_string(), |pin| pin.to_string())
            };
            writeln!(
                f,
                "  {name}: Echo=GPIO{}, Trig=GPIO{}",
                pin(&self.echo_pins),
                pin(&self.trig_pins)
            )?;
        }
        writeln!(f)?;
        write!(
            f,
            "Note: the HC-SR04 echo line is 5 V; use a divider down to 3.3 V before the GPIO input."
        )
    }
}
