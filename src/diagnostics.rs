//! Bench routines behind the CLI.
//!
//! Each routine takes an opened GPIO session, a clock and the configuration, and returns a
//! report. Live progress goes through a callback so the caller decides how to show it.

use crate::array::{Batch, SensorArray};
use crate::config::{Config, SensorConfig};
use crate::error::{ConfigError, Result};
use crate::gpio::{Direction, GpioPort, GpioSession, PinId};
use crate::recorder::Recorder;
use crate::sensor::UltrasonicSensor;
use crate::utils::clock::Clock;
use log::info;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const SINGLE_SENSOR_SAMPLES: usize = 10;
pub const SINGLE_SENSOR_PAUSE: Duration = Duration::from_millis(500);
/// Default cap on batches for the all-sensor test.
pub const ALL_SENSORS_MAX_BATCHES: usize = 20;
pub const IO_TEST_CYCLES: usize = 3;
pub const IO_TEST_HOLD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSensorReport {
    pub sensor: String,
    pub distances: Vec<u32>,
    pub interrupted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllSensorsReport {
    pub sensors: Vec<String>,
    pub batches: usize,
    /// Timestamp of the last batch.
    pub elapsed: Duration,
    /// Mean distance per sensor, in configured order. Empty when no batch completed.
    pub averages: Vec<f64>,
    pub output: PathBuf,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoTestReport {
    pub pin: PinId,
    pub cycles: usize,
}

/// Takes [`SINGLE_SENSOR_SAMPLES`] readings from the first configured sensor.
pub fn single_sensor_test<P, C>(
    mut session: GpioSession<P>,
    clock: &C,
    config: &Config,
    cancel: &AtomicBool,
    mut on_reading: impl FnMut(usize, u32),
) -> Result<SingleSensorReport>
where
    P: GpioPort,
    C: Clock,
{
    let sensor_config = first_sensor(config)?;
    info!("Single sensor test on {}", sensor_config.name);
    let mut sensor = UltrasonicSensor::new(sensor_config, config, &mut *session)?;

    let mut distances = Vec::with_capacity(SINGLE_SENSOR_SAMPLES);
    for index in 0..SINGLE_SENSOR_SAMPLES {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        let distance = sensor.measure(&mut *session, clock);
        on_reading(index, distance);
        distances.push(distance);
        clock.delay(SINGLE_SENSOR_PAUSE);
    }

    Ok(SingleSensorReport {
        sensor: sensor.name().to_string(),
        interrupted: distances.len() < SINGLE_SENSOR_SAMPLES,
        distances,
    })
}

/// Runs `batches` acquisition cycles over every sensor and records them to `output`.
pub fn all_sensors_test<P, C>(
    session: GpioSession<P>,
    clock: C,
    config: &Config,
    batches: usize,
    output: PathBuf,
    cancel: &AtomicBool,
    mut on_batch: impl FnMut(usize, &Batch),
) -> Result<AllSensorsReport>
where
    P: GpioPort,
    C: Clock,
{
    let mut array = SensorArray::new(session, clock, config)?;
    let sensors = array.sensor_names();
    let recorder = Recorder::create(&output, &sensors)?;

    let mut sums = vec![0u64; sensors.len()];
    let mut count = 0;
    let mut elapsed = Duration::ZERO;
    for (index, batch) in array.run(Some(batches), cancel).enumerate() {
        on_batch(index, &batch);
        for (sum, distance) in sums.iter_mut().zip(batch.distances()) {
            *sum += u64::from(distance);
        }
        count += 1;
        elapsed = batch.timestamp;
        recorder.record(batch);
    }
    array.shutdown();

    let rows = recorder.finish()?;
    info!("{rows} batches written to {}", output.display());

    let averages = if count == 0 {
        Vec::new()
    } else {
        sums.iter().map(|&sum| sum as f64 / count as f64).collect()
    };
    Ok(AllSensorsReport {
        sensors,
        batches: count,
        elapsed,
        averages,
        output,
        interrupted: count < batches,
    })
}

/// Toggles the first sensor's trigger pin high and low [`IO_TEST_CYCLES`] times.
pub fn gpio_io_test<P, C>(
    mut session: GpioSession<P>,
    clock: &C,
    config: &Config,
    mut on_cycle: impl FnMut(usize),
) -> Result<IoTestReport>
where
    P: GpioPort,
    C: Clock,
{
    let pin = first_sensor(config)?.trig_pin;
    session.configure(pin, Direction::Output, Some(false))?;

    for cycle in 0..IO_TEST_CYCLES {
        session.write(pin, true)?;
        clock.delay(IO_TEST_HOLD);
        session.write(pin, false)?;
        clock.delay(IO_TEST_HOLD);
        on_cycle(cycle);
    }

    Ok(IoTestReport {
        pin,
        cycles: IO_TEST_CYCLES,
    })
}

fn first_sensor(config: &Config) -> Result<SensorConfig> {
    config
        .sensor_configs()?
        .into_iter()
        .next()
        .ok_or_else(|| ConfigError::Invalid("no sensors configured".into()).into())
}
