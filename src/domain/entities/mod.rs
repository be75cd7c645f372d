//! Domain entities - Core business objects

pub mod command;
pub mod message;
pub mod render;

pub use command::{Command, ParsedMessage};
pub use message::{ConversationId, InboundEvent, Reply};
pub use render::{Background, CanvasSpec, Color, FontSpec, ImageFormat, RenderRequest, RenderedImage};
