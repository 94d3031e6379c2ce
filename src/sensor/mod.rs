//! HC-SR04 Ultrasonic Sensor Module
//!
//! Fires the trigger pulse, times the echo pulse with two timeout-bounded busy-poll loops and
//! converts the round trip into millimetres. Faults never escape [`UltrasonicSensor::measure`];
//! they degrade to the rolling history or to the cutoff distance.

pub mod history;

use crate::config::{
    Config, SensorConfig, RISING_EDGE_TIMEOUT, SETTLE_DELAY, SOUND_SPEED_MPS, TRIGGER_PULSE,
};
use crate::error::GpioError;
use crate::gpio::{Direction, GpioPort};
use crate::utils::clock::Clock;
use history::History;
use log::{debug, warn};
use std::time::Duration;

/// How a measurement's distance was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A complete echo pulse was timed.
    Echo,
    /// The echo outlasted the cutoff round trip; the distance is the cutoff.
    OutOfRange,
    /// The echo line never rose within the rising-edge timeout.
    NoEcho,
    /// The timing was implausible and the history fallback was used.
    Noise,
    /// A pin read or write failed; the distance is the cutoff.
    IoFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub distance_mm: u32,
    /// Timed echo width. Zero for `NoEcho`, `Noise` and `IoFault`.
    pub echo: Duration,
    pub outcome: Outcome,
}

enum EchoTiming {
    Pulse { width: Duration, truncated: bool },
    /// The line rose but no high sample followed it.
    Glitch,
    NoEcho,
}

pub struct UltrasonicSensor {
    config: SensorConfig,
    cutoff_mm: u32,
    cutoff_round_trip: Duration,
    history: History,
}

impl UltrasonicSensor {
    /// Configures the echo pin as input and the trigger pin as output, driven low.
    pub fn new<P: GpioPort + ?Sized>(
        config: SensorConfig,
        settings: &Config,
        gpio: &mut P,
    ) -> Result<Self, GpioError> {
        gpio.configure(config.echo_pin, Direction::Input, None)?;
        gpio.configure(config.trig_pin, Direction::Output, Some(false))?;
        debug!(
            "Sensor {} ready (echo {}, trig {})",
            config.name, config.echo_pin, config.trig_pin
        );

        Ok(Self {
            config,
            cutoff_mm: settings.cutoff_range_mm,
            cutoff_round_trip: settings.cutoff_round_trip(),
            history: History::new(settings.history_length),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn cutoff_mm(&self) -> u32 {
        self.cutoff_mm
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Measures the distance in millimetres, always within `0..=cutoff`.
    pub fn measure<P, C>(&mut self, gpio: &mut P, clock: &C) -> u32
    where
        P: GpioPort + ?Sized,
        C: Clock + ?Sized,
    {
        self.measure_detailed(gpio, clock).distance_mm
    }

    /// Like [`measure`](Self::measure), also reporting how the distance was obtained.
    pub fn measure_detailed<P, C>(&mut self, gpio: &mut P, clock: &C) -> Measurement
    where
        P: GpioPort + ?Sized,
        C: Clock + ?Sized,
    {
        let measurement = match self.time_echo(gpio, clock) {
            Ok(timing) => {
                let measurement = self.resolve(timing);
                self.history.push(measurement.distance_mm);
                measurement
            }
            Err(err) => {
                warn!("Measurement error ({}): {err}", self.config.name);
                Measurement {
                    distance_mm: self.cutoff_mm,
                    echo: Duration::ZERO,
                    outcome: Outcome::IoFault,
                }
            }
        };

        clock.delay(SETTLE_DELAY);
        measurement
    }

    fn time_echo<P, C>(&self, gpio: &mut P, clock: &C) -> Result<EchoTiming, GpioError>
    where
        P: GpioPort + ?Sized,
        C: Clock + ?Sized,
    {
        let echo_pin = self.config.echo_pin;

        gpio.write(self.config.trig_pin, true)?;
        clock.delay(TRIGGER_PULSE);
        gpio.write(self.config.trig_pin, false)?;

        // Rising edge: sig_off is the time of the last low sample.
        let start = clock.now();
        let mut sig_off = start;
        while !gpio.read(echo_pin)? {
            sig_off = clock.now();
            if sig_off.saturating_sub(start) > RISING_EDGE_TIMEOUT {
                return Ok(EchoTiming::NoEcho);
            }
        }

        // Falling edge: sig_on is the time of the last high sample.
        let mut sig_on = None;
        let mut truncated = false;
        while gpio.read(echo_pin)? {
            let now = clock.now();
            if now.saturating_sub(sig_off) > self.cutoff_round_trip {
                sig_on = Some(sig_off + self.cutoff_round_trip);
                truncated = true;
                break;
            }
            sig_on = Some(now);
        }

        Ok(match sig_on {
            Some(sig_on) => EchoTiming::Pulse {
                width: sig_on - sig_off,
                truncated,
            },
            None => EchoTiming::Glitch,
        })
    }

    fn resolve(&self, timing: EchoTiming) -> Measurement {
        match timing {
            EchoTiming::Pulse { width, truncated } => {
                let distance_mm = resolve_distance(
                    raw_distance_mm(width.as_secs_f64()),
                    self.history.latest(),
                    self.cutoff_mm,
                );
                let outcome = if truncated || distance_mm == self.cutoff_mm {
                    Outcome::OutOfRange
                } else {
                    Outcome::Echo
                };
                Measurement {
                    distance_mm,
                    echo: width,
                    outcome,
                }
            }
            EchoTiming::Glitch => {
                warn!("@{}: noise detected, reusing previous distance", self.config.name);
                self.fallback(Outcome::Noise)
            }
            EchoTiming::NoEcho => {
                debug!("@{}: no echo within {:?}", self.config.name, RISING_EDGE_TIMEOUT);
                self.fallback(Outcome::NoEcho)
            }
        }
    }

    fn fallback(&self, outcome: Outcome) -> Measurement {
        Measurement {
            distance_mm: fallback_distance(self.history.latest(), self.cutoff_mm),
            echo: Duration::ZERO,
            outcome,
        }
    }
}

/// Converts an echo width in seconds into a rounded distance in millimetres.
pub fn raw_distance_mm(echo_seconds: f64) -> i64 {
    (echo_seconds * SOUND_SPEED_MPS / 2.0 * 1000.0).round() as i64
}

/// Caps a raw distance at the cutoff; negative values fall back to the history.
pub fn resolve_distance(raw_mm: i64, latest_mm: u32, cutoff_mm: u32) -> u32 {
    if raw_mm < 0 {
        fallback_distance(latest_mm, cutoff_mm)
    } else {
        raw_mm.min(cutoff_mm as i64) as u32
    }
}

fn fallback_distance(latest_mm: u32, cutoff_mm: u32) -> u32 {
    if latest_mm > 0 {
        latest_mm.min(cutoff_mm)
    } else {
        cutoff_mm
    }
}
