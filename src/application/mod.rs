//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Commands: Chat command handlers and their registration
//! - Errors: Application error types
//! - Messaging: Message parsing and dispatching
//! - Services: Rendering, render pool and the bot session

pub mod commands;
pub mod errors;
pub mod messaging;
pub mod services;
