//! GPIO Module
//!
//! The digital I/O capability the sensors are driven through, the scoped session that
//! guarantees cleanup, and the two implementations: `rppal` for the board and a scripted
//! fake for tests and `--simulate` runs.

pub mod fake;
pub mod rppal_port;

use crate::error::GpioError;
use log::debug;
use std::fmt;
use std::ops::{Deref, DerefMut};

pub type PinId = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// Digital I/O capability.
///
/// `configure` is called once per pin before use. Reading an unconfigured pin, or
/// writing anything but a configured output, returns [`GpioError::Io`].
pub trait GpioPort {
    fn initialize() -> Result<Self, GpioError>
    where
        Self: Sized;

    fn configure(
        &mut self,
        pin: PinId,
        direction: Direction,
        initial_level: Option<bool>,
    ) -> Result<(), GpioError>;

    fn write(&mut self, pin: PinId, level: bool) -> Result<(), GpioError>;

    fn read(&mut self, pin: PinId) -> Result<bool, GpioError>;

    /// Returns every configured pin to input and releases the hardware.
    /// Must be idempotent.
    fn terminate(&mut self);
}

/// Owns an initialized port for the lifetime of an acquisition and terminates it on
/// every exit path, including early returns and unwinding.
pub struct GpioSession<P: GpioPort> {
    port: P,
    released: bool,
}

impl<P: GpioPort> GpioSession<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            released: false,
        }
    }

    pub fn open() -> Result<Self, GpioError> {
        P::initialize().map(Self::new)
    }

    /// Terminates the port now. Calling it again, or dropping afterwards, is a no-op.
    pub fn release(&mut self) {
        if !self.released {
            debug!("Releasing GPIO session");
            self.port.terminate();
            self.released = true;
        }
    }
}

impl<P: GpioPort> Deref for GpioSession<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.port
    }
}

impl<P: GpioPort> DerefMut for GpioSession<P> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

impl<P: GpioPort> Drop for GpioSession<P> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeGpio;
    use super::*;

    #[test]
    fn session_terminates_on_drop() {
        let fake = FakeGpio::default();
        {
            let mut session = GpioSession::new(fake.clone());
            session.configure(4, Direction::Output, Some(false)).unwrap();
            assert_eq!(fake.direction(4), Some(Direction::Output));
        }
        assert_eq!(fake.direction(4), Some(Direction::Input));
        assert!(fake.is_released());
        assert_eq!(fake.terminate_calls(), 1);
    }

    #[test]
    fn explicit_release_is_not_repeated_on_drop() {
        let fake = FakeGpio::default();
        let mut session = GpioSession::new(fake.clone());
        session.release();
        session.release();
        drop(session);
        assert_eq!(fake.terminate_calls(), 1);
    }

    #[test]
    fn session_terminates_when_unwinding() {
        let fake = FakeGpio::default();
        let probe = fake.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut session = GpioSession::new(fake);
            session.configure(9, Direction::Output, None).unwrap();
            panic!("abort mid-acquisition");
        }));
        assert!(result.is_err());
        assert!(probe.is_released());
        assert_eq!(probe.direction(9), Some(Direction::Input));
    }
}
