//! Domain layer - Core types shared by every other layer
//! 
//! This layer contains:
//! - Entities: Commands, messages, replies and render requests
//! - Traits: Abstractions for infrastructure (Transport)

pub mod entities;
pub mod traits;
