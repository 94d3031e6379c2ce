//! Utilities Module
//!
//! Timing and process-signal helpers shared by the acquisition code and the CLI.

pub mod clock;
pub mod shutdown;
