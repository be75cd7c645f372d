//! Text layout and raster rendering

pub mod layout;
pub mod renderer;

pub use layout::{layout, LayoutLine, TextLayout};
pub use renderer::{Renderer, TextBlock};
