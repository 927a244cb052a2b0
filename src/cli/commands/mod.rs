//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait and is routed by
//! [`CommandDispatcher`]. Every invocation discovers a fresh registry and
//! evaluates in a fresh session; nothing carries over between runs.

pub mod check;
pub mod completions;
pub mod dispatcher;
pub mod list;
pub mod report;

pub use dispatcher::{load_preconditions, Command, CommandDispatcher, CommandResult};
