//! CLI support modules for giro

pub mod progress;

pub use progress::create_spinner;
