//! Raspberry Pi GPIO adapter
//!
//! Drives pins through `rppal`. Each configured pin is held as an `IoPin` so its mode can be
//! switched back to input on termination.

use super::{Direction, GpioPort, PinId};
use crate::error::GpioError;
use log::{debug, info};
use rppal::gpio::{Gpio, IoPin, Level, Mode};
use std::collections::BTreeMap;

struct ConfiguredPin {
    pin: IoPin,
    direction: Direction,
}

pub struct RppalGpio {
    gpio: Option<Gpio>,
    pins: BTreeMap<PinId, ConfiguredPin>,
}

impl RppalGpio {
    fn gpio(&self) -> Result<&Gpio, String> {
        self.gpio
            .as_ref()
            .ok_or_else(|| "GPIO already terminated".to_string())
    }

    fn configured(&mut self, pin: PinId) -> Result<&mut ConfiguredPin, GpioError> {
        self.pins.get_mut(&pin).ok_or_else(|| GpioError::Io {
            pin,
            reason: "pin is not configured".into(),
        })
    }
}

impl GpioPort for RppalGpio {
    fn initialize() -> Result<Self, GpioError> {
        let gpio = Gpio::new().map_err(|err| GpioError::HardwareUnavailable {
            reason: err.to_string(),
        })?;
        info!("GPIO initialized");
        Ok(Self {
            gpio: Some(gpio),
            pins: BTreeMap::new(),
        })
    }

    fn configure(
        &mut self,
        pin: PinId,
        direction: Direction,
        initial_level: Option<bool>,
    ) -> Result<(), GpioError> {
        let fail = |reason: String| GpioError::PinConfiguration {
            pin,
            direction,
            reason,
        };
        if self.pins.contains_key(&pin) {
            return Err(fail("pin is already configured".into()));
        }

        let mode = match direction {
            Direction::Input => Mode::Input,
            Direction::Output => Mode::Output,
        };
        let mut io_pin = self
            .gpio()
            .map_err(&fail)?
            .get(pin)
            .map_err(|err| fail(err.to_string()))?
            .into_io(mode);
        if let (Direction::Output, Some(level)) = (direction, initial_level) {
            io_pin.write(to_level(level));
        }

        debug!("Pin {pin} configured as {direction}");
        self.pins.insert(
            pin,
            ConfiguredPin {
                pin: io_pin,
                direction,
            },
        );
        Ok(())
    }

    fn write(&mut self, pin: PinId, level: bool) -> Result<(), GpioError> {
        let configured = self.configured(pin)?;
        if configured.direction != Direction::Output {
            return Err(GpioError::Io {
                pin,
                reason: "write to an input pin".into(),
            });
        }
        configured.pin.write(to_level(level));
        Ok(())
    }

    fn read(&mut self, pin: PinId) -> Result<bool, GpioError> {
        let configured = self.configured(pin)?;
        Ok(configured.pin.read() == Level::High)
    }

    fn terminate(&mut self) {
        for (number, mut configured) in std::mem::take(&mut self.pins) {
            configured.pin.set_mode(Mode::Input);
            // Leave the line as an input instead of restoring the mode it had before we took it.
            configured.pin.set_reset_on_drop(false);
            debug!("Pin {number} returned to input");
        }
        if self.gpio.take().is_some() {
            info!("GPIO cleanup complete");
        } else {
            debug!("GPIO already released");
        }
    }
}

fn to_level(level: bool) -> Level {
    if level {
        Level::High
    } else {
        Level::Low
    }
}
