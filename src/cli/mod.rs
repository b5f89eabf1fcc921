//! CLI command implementations

pub mod error;
pub mod simulate;

pub use error::CliError;
pub use simulate::{Cli, Commands, SimulateArgs};
