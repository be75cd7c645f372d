//! Message handling - prefix parsing and command dispatch

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use parser::CommandParser;
