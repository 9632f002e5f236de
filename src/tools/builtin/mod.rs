//! Built-in tools.

pub mod code;
pub mod file;
pub mod screen;
pub mod style;
