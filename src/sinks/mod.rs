//! Sink implementations

pub mod console;
pub mod rotating_file;

pub use console::{ConsoleSink, ConsoleTarget};
pub use rotating_file::{RotatingFileSink, RotationFallback};

pub use crate::core::Sink;
