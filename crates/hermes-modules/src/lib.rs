//! # hermes-modules
//!
//! Routes chat commands to modules: prefix parsing, the module registry,
//! the bus-driven dispatcher, and the built-in `ping`, `help` and `search`
//! commands.

pub mod builtins;
pub mod command;
pub mod dispatcher;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use command::parse_command;
pub use dispatcher::Dispatcher;
pub use registry::{CommandSummary, ModuleRegistry};
