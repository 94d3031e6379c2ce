//! Sequential acquisition over every configured sensor.
//!
//! Sensors are triggered one after another, never in parallel: overlapping pings corrupt
//! each other's echo timing. The array owns the [`GpioSession`], so the port is released
//! whenever the array goes away.

use crate::config::Config;
use crate::error::Result;
use crate::gpio::{GpioPort, GpioSession};
use crate::sensor::UltrasonicSensor;
use crate::utils::clock::Clock;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub sensor: String,
    pub distance_mm: u32,
}

/// One reading per sensor, in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Monotonic time since the array was built, taken before the first trigger.
    pub timestamp: Duration,
    pub readings: Vec<Reading>,
}

impl Batch {
    pub fn distances(&self) -> impl Iterator<Item = u32> + '_ {
        self.readings.iter().map(|reading| reading.distance_mm)
    }
}

pub struct SensorArray<P: GpioPort, C: Clock> {
    sensors: Vec<UltrasonicSensor>,
    session: GpioSession<P>,
    clock: C,
    started_at: Duration,
}

impl<P: GpioPort, C: Clock> SensorArray<P, C> {
    /// Builds one sensor per configured entry on the shared port.
    ///
    /// If any sensor cannot configure its pins the whole array fails and the session is
    /// released, returning every pin claimed so far to input.
    pub fn new(mut session: GpioSession<P>, clock: C, config: &Config) -> Result<Self> {
        config.validate()?;
        let sensors = config
            .sensor_configs()?
            .into_iter()
            .map(|sensor| UltrasonicSensor::new(sensor, config, &mut *session))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Sensor array ready: {}",
            sensors
                .iter()
                .map(UltrasonicSensor::name)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let started_at = clock.now();
        Ok(Self {
            sensors,
            session,
            clock,
            started_at,
        })
    }

    pub fn sensors(&self) -> &[UltrasonicSensor] {
        &self.sensors
    }

    pub fn sensor_names(&self) -> Vec<String> {
        self.sensors
            .iter()
            .map(|sensor| sensor.name().to_string())
            .collect()
    }

    /// Measures every sensor once, strictly in configured order.
    pub fn measure_all(&mut self) -> Batch {
        let timestamp = self.clock.now().saturating_sub(self.started_at);
        let readings = self
            .sensors
            .iter_mut()
            .map(|sensor| Reading {
                sensor: sensor.name().to_string(),
                distance_mm: sensor.measure(&mut *self.session, &self.clock),
            })
            .collect();
        let batch = Batch {
            timestamp,
            readings,
        };
        debug!("Batch at {:.3}s: {:?}", timestamp.as_secs_f64(), batch.readings);
        batch
    }

    /// Lazily yields batches until `limit` is reached (if any) or `cancel` is set.
    /// The flag is checked before every batch.
    pub fn run<'a>(&'a mut self, limit: Option<usize>, cancel: &'a AtomicBool) -> Run<'a, P, C> {
        Run {
            array: self,
            remaining: limit,
            cancel,
        }
    }

    /// Releases the GPIO session now. Dropping the array does the same.
    pub fn shutdown(mut self) {
        self.session.release();
    }
}

pub struct Run<'a, P: GpioPort, C: Clock> {
    array: &'a mut SensorArray<P, C>,
    remaining: Option<usize>,
    cancel: &'a AtomicBool,
}

impl<P: GpioPort, C: Clock> Run<'_, P, C> {
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

impl<P: GpioPort, C: Clock> Iterator for Run<'_, P, C> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.remaining == Some(0) {
            return None;
        }
        if self.cancelled() {
            info!("Acquisition cancelled");
            return None;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(self.array.measure_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, GpioError};
    use crate::gpio::fake::{Echo, FakeGpio};
    use crate::gpio::Direction;
    use crate::utils::clock::FakeClock;
    use std::collections::BTreeMap;

    fn three_sensor_config() -> Config {
        let names = ["Left", "Front", "Right"];
        Config {
            sensors: names.iter().map(|name| name.to_string()).collect(),
            echo_pins: BTreeMap::from([
                ("Left".to_string(), 5),
                ("Front".to_string(), 6),
                ("Right".to_string(), 13),
            ]),
            trig_pins: BTreeMap::from([
                ("Left".to_string(), 20),
                ("Front".to_string(), 21),
                ("Right".to_string(), 26),
            ]),
            ..Config::default()
        }
    }

    fn scripted_array(
        config: &Config,
        distances: &[u32],
    ) -> (SensorArray<FakeGpio, FakeClock>, FakeGpio) {
        let fake = FakeGpio::default();
        for (sensor, &distance) in config.sensor_configs().unwrap().iter().zip(distances) {
            fake.script_echoes(
                sensor.trig_pin,
                sensor.echo_pin,
                [Echo::at_distance_mm(distance)],
            );
        }
        let clock = fake.clock();
        let array = SensorArray::new(GpioSession::new(fake.clone()), clock, config).unwrap();
        (array, fake)
    }

    #[test]
    fn batch_follows_configured_order() {
        let config = three_sensor_config();
        let (mut array, fake) = scripted_array(&config, &[100, 200, 300]);

        let batch = array.measure_all();

        assert_eq!(batch.distances().collect::<Vec<_>>(), vec![100, 200, 300]);
        let names: Vec<_> = batch.readings.iter().map(|r| r.sensor.as_str()).collect();
        assert_eq!(names, vec!["Left", "Front", "Right"]);
        let triggered: Vec<_> = fake.trigger_log().iter().map(|(pin, _)| *pin).collect();
        assert_eq!(triggered, vec![20, 21, 26]);
    }

    #[test]
    fn timestamps_strictly_increase() {
        let config = three_sensor_config();
        let (mut array, _fake) = scripted_array(&config, &[100, 200, 300]);
        let stamps: Vec<_> = (0..4).map(|_| array.measure_all().timestamp).collect();
        assert_eq!(stamps[0], Duration::ZERO);
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn bounded_run_yields_exactly_limit() {
        let config = three_sensor_config();
        let (mut array, _fake) = scripted_array(&config, &[400, 500, 600]);
        let cancel = AtomicBool::new(false);
        let batches: Vec<_> = array.run(Some(3), &cancel).collect();
        assert_eq!(batches.len(), 3);
        assert!(batches
            .iter()
            .all(|batch| batch.distances().eq([400, 500, 600])));
    }

    #[test]
    fn unbounded_run_stops_when_cancelled() {
        let config = three_sensor_config();
        let (mut array, fake) = scripted_array(&config, &[100, 200, 300]);
        let cancel = AtomicBool::new(false);
        let mut seen = 0;
        for _batch in array.run(None, &cancel) {
            seen += 1;
            if seen == 5 {
                cancel.store(true, Ordering::SeqCst);
            }
        }
        assert_eq!(seen, 5);
        drop(array);
        assert!(fake.is_released());
    }

    #[test]
    fn pin_failure_aborts_array_and_releases_claimed_pins() {
        let config = three_sensor_config();
        let fake = FakeGpio::default();
        fake.reject_pin(13);
        let clock = fake.clock();

        let result = SensorArray::new(GpioSession::new(fake.clone()), clock, &config);

        assert!(matches!(
            result,
            Err(Error::Gpio(GpioError::PinConfiguration { pin: 13, .. }))
        ));
        assert!(fake.is_released());
        for pin in [5, 20, 6, 21] {
            assert_eq!(fake.direction(pin), Some(Direction::Input));
        }
    }

    #[test]
    fn shutdown_releases_once() {
        let config = three_sensor_config();
        let (array, fake) = scripted_array(&config, &[100, 200, 300]);
        array.shutdown();
        assert_eq!(fake.terminate_calls(), 1);
    }
}
