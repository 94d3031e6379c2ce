//! Scripted GPIO port
//!
//! Each trigger pin can be wired to an echo pin with a queue of [`Echo`] responses. When the
//! trigger falls, the next response is armed relative to that instant; the last response
//! repeats once the queue is drained. Every `read` advances the shared [`FakeClock`] by one
//! poll step, so timings are exact multiples of the step.

use super::{Direction, GpioPort, PinId};
use crate::config::{Config, SOUND_SPEED_MPS};
use crate::error::{ConfigError, GpioError};
use crate::utils::clock::{Clock, FakeClock};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

pub const DEFAULT_POLL_STEP: Duration = Duration::from_micros(1);
pub const DEFAULT_ECHO_DELAY: Duration = Duration::from_micros(100);
const SIMULATED_SCRIPT_LEN: usize = 64;

/// Echo behaviour after one trigger pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    Pulse { delay: Duration, width: Duration },
    /// The echo line never rises.
    Silent,
}

impl Echo {
    /// Pulse whose width is the round trip for `distance_mm`, rounded to whole microseconds.
    pub fn at_distance_mm(distance_mm: u32) -> Self {
        let width_us = (distance_mm as f64 * 2.0 / 1000.0 / SOUND_SPEED_MPS
            * 1_000_000.0)
            .round() as u64;
        Echo::Pulse {
            delay: DEFAULT_ECHO_DELAY,
            width: Duration::from_micros(width_us),
        }
    }
}

struct EchoChannel {
    echo_pin: PinId,
    script: VecDeque<Echo>,
    last: Echo,
}

#[derive(Default)]
struct FakeState {
    poll_step: Duration,
    directions: BTreeMap<PinId, Direction>,
    levels: HashMap<PinId, bool>,
    channels: HashMap<PinId, EchoChannel>,
    windows: HashMap<PinId, (Duration, Duration)>,
    failing_pins: BTreeSet<PinId>,
    failing_io: BTreeSet<PinId>,
    trigger_log: Vec<(PinId, Duration)>,
    terminate_calls: usize,
    released: bool,
}

/// Cloning yields another handle onto the same simulated board, which lets a test keep
/// inspecting the port after moving it into a session.
#[derive(Clone)]
pub struct FakeGpio {
    clock: FakeClock,
    state: Rc<RefCell<FakeState>>,
}

impl Default for FakeGpio {
    fn default() -> Self {
        Self::with_clock(FakeClock::default())
    }
}

impl FakeGpio {
    pub fn with_clock(clock: FakeClock) -> Self {
        Self {
            clock,
            state: Rc::new(RefCell::new(FakeState {
                poll_step: DEFAULT_POLL_STEP,
                ..FakeState::default()
            })),
        }
    }

    /// A board where every configured sensor sees a slowly drifting obstacle, with an
    /// occasional missing echo. Used by `--simulate`.
    pub fn simulating(config: &Config) -> Result<Self, ConfigError> {
        let fake = Self::default();
        for (index, sensor) in config.sensor_configs()?.iter().enumerate() {
            let base = 300 + 250 * index as u32;
            let echoes = (0..SIMULATED_SCRIPT_LEN).map(|step| {
                if (step + index) % 17 == 16 {
                    Echo::Silent
                } else {
                    let drift = (step as u32 * 37 + index as u32 * 11) % 120;
                    Echo::at_distance_mm((base + drift).min(config.cutoff_range_mm))
                }
            });
            fake.script_echoes(sensor.trig_pin, sensor.echo_pin, echoes);
        }
        Ok(fake)
    }

    pub fn clock(&self) -> FakeClock {
        self.clock.clone()
    }

    pub fn set_poll_step(&self, step: Duration) {
        self.state.borrow_mut().poll_step = step;
    }

    /// Wires `trig_pin` to `echo_pin` and queues the responses to successive triggers.
    pub fn script_echoes(
        &self,
        trig_pin: PinId,
        echo_pin: PinId,
        echoes: impl IntoIterator<Item = Echo>,
    ) {
        let script: VecDeque<Echo> = echoes.into_iter().collect();
        let last = script.back().copied().unwrap_or(Echo::Silent);
        self.state.borrow_mut().channels.insert(
            trig_pin,
            EchoChannel {
                echo_pin,
                script,
                last,
            },
        );
    }

    /// Makes `configure` fail for this pin.
    pub fn reject_pin(&self, pin: PinId) {
        self.state.borrow_mut().failing_pins.insert(pin);
    }

    /// Makes `read` and `write` fail for this pin.
    pub fn fail_io(&self, pin: PinId) {
        self.state.borrow_mut().failing_io.insert(pin);
    }

    pub fn direction(&self, pin: PinId) -> Option<Direction> {
        self.state.borrow().directions.get(&pin).copied()
    }

    pub fn level(&self, pin: PinId) -> bool {
        self.state.borrow().levels.get(&pin).copied().unwrap_or(false)
    }

    /// Trigger pins in the order their pulses ended, with the virtual time of each.
    pub fn trigger_log(&self) -> Vec<(PinId, Duration)> {
        self.state.borrow().trigger_log.clone()
    }

    pub fn terminate_calls(&self) -> usize {
        self.state.borrow().terminate_calls
    }

    pub fn is_released(&self) -> bool {
        self.state.borrow().released
    }
}

impl GpioPort for FakeGpio {
    fn initialize() -> Result<Self, GpioError> {
        Ok(Self::default())
    }

    fn configure(
        &mut self,
        pin: PinId,
        direction: Direction,
        initial_level: Option<bool>,
    ) -> Result<(), GpioError> {
        let mut state = self.state.borrow_mut();
        let fail = |reason: &str| GpioError::PinConfiguration {
            pin,
            direction,
            reason: reason.into(),
        };
        if state.released {
            return Err(fail("port has been terminated"));
        }
        if state.failing_pins.contains(&pin) {
            return Err(fail("pin rejected by fake board"));
        }
        if state.directions.contains_key(&pin) {
            return Err(fail("pin is already configured"));
        }
        state.directions.insert(pin, direction);
        state.levels.insert(pin, initial_level.unwrap_or(false));
        Ok(())
    }

    fn write(&mut self, pin: PinId, level: bool) -> Result<(), GpioError> {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        if state.failing_io.contains(&pin) {
            return Err(GpioError::Io {
                pin,
                reason: "simulated write failure".into(),
            });
        }
        match state.directions.get(&pin) {
            Some(Direction::Output) => {}
            Some(Direction::Input) => {
                return Err(GpioError::Io {
                    pin,
                    reason: "write to an input pin".into(),
                })
            }
            None => {
                return Err(GpioError::Io {
                    pin,
                    reason: "pin is not configured".into(),
                })
            }
        }

        let was_high = state.levels.insert(pin, level).unwrap_or(false);
        if was_high && !level {
            state.trigger_log.push((pin, now));
            let armed = state.channels.get_mut(&pin).map(|channel| {
                let echo = channel.script.pop_front().unwrap_or(channel.last);
                (channel.echo_pin, echo)
            });
            match armed {
                Some((echo_pin, Echo::Pulse { delay, width })) => {
                    let rise = now + delay;
                    state.windows.insert(echo_pin, (rise, rise + width));
                }
                Some((echo_pin, Echo::Silent)) => {
                    state.windows.remove(&echo_pin);
                }
                None => {}
            }
        }
        Ok(())
    }

    fn read(&mut self, pin: PinId) -> Result<bool, GpioError> {
        let state = self.state.borrow();
        if state.failing_io.contains(&pin) {
            return Err(GpioError::Io {
                pin,
                reason: "simulated read failure".into(),
            });
        }
        if !state.directions.contains_key(&pin) {
            return Err(GpioError::Io {
                pin,
                reason: "pin is not configured".into(),
            });
        }
        self.clock.advance(state.poll_step);
        let now = self.clock.now();
        Ok(match state.windows.get(&pin) {
            Some(&(rise, fall)) => rise <= now && now < fall,
            None => state.levels.get(&pin).copied().unwrap_or(false),
        })
    }

    fn terminate(&mut self) {
        let mut state = self.state.borrow_mut();
        state.terminate_calls += 1;
        for direction in state.directions.values_mut() {
            *direction = Direction::Input;
        }
        state.windows.clear();
        state.released = true;
    }
}
