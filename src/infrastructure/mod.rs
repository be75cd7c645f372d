//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Fonts: Font files on disk and the shared font cache
//! - Rendering: Text layout and image encoding
//! - Adapters: Transport implementations (console, in-memory)

pub mod adapters;
pub mod config;
pub mod fonts;
pub mod rendering;
