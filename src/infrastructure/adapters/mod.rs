//! Transport adapters

pub mod console;
pub mod memory;

pub use console::ConsoleTransport;
pub use memory::{MemoryTransport, SentReply};
