pub mod core;
pub mod tracing;

#[cfg(feature = "cli")]
pub mod cli;
