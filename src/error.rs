use crate::gpio::{Direction, PinId};
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a [`GpioPort`](crate::gpio::GpioPort) implementation.
#[derive(Debug, Error)]
pub enum GpioError {
    #[error("GPIO hardware unavailable: {reason}\n  hint: run on the target board and make sure /dev/gpiochip0 is readable by this user (e.g. member of the `gpio` group)")]
    HardwareUnavailable { reason: String },

    #[error("failed to configure pin {pin} as {direction}: {reason}")]
    PinConfiguration {
        pin: PinId,
        direction: Direction,
        reason: String,
    },

    #[error("I/O failure on pin {pin}: {reason}")]
    Io { pin: PinId, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write configuration {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gpio(#[from] GpioError),

    #[error("recorder failed on {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
