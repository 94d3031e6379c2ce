//! Distance acquisition from an array of HC-SR04 ultrasonic sensors on Linux GPIO.
//!
//! [`array::SensorArray`] triggers each [`sensor::UltrasonicSensor`] in turn through a
//! [`gpio::GpioPort`] and produces timestamped [`array::Batch`]es, which
//! [`recorder::Recorder`] appends to a CSV file.

pub mod array;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod gpio;
pub mod menu;
pub mod recorder;
pub mod sensor;
pub mod utils;
