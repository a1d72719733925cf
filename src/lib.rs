// Library module for hashit
// Re-exports modules for use in integration tests and the binary

pub mod cli;
pub mod config;
pub mod hash;
pub mod logging;
pub mod output;
