use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::application::errors::RenderError;

/// RGBA color, written as `#rrggbb` or `#rrggbbaa` in config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color([r, g, b, 255])
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba(self.0)
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(format!("expected #rrggbb or #rrggbbaa, got '{}'", s));
        }

        let mut channels = [255u8; 4];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
            channels[i] = u8::from_str_radix(pair, 16)
                .map_err(|_| format!("invalid hex digits '{}' in color '{}'", pair, s))?;
        }
        Ok(Color(channels))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }
}

/// Raster encoding of a rendered image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            other => Err(format!("unsupported image format '{}'", other)),
        }
    }
}

/// What the canvas is filled with before text is drawn
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Color(Color),
    /// Image file, scaled and cropped to cover the canvas
    Image(PathBuf),
}

impl Default for Background {
    fn default() -> Self {
        Background::Color(Color::WHITE)
    }
}

/// Font family and size in points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    pub family: String,
    pub size: u32,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size: u32) -> Self {
        Self {
            family: family.into(),
            size,
        }
    }
}

/// Canvas dimensions, fill and output encoding
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub background: Background,
    pub format: ImageFormat,
}

impl CanvasSpec {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidRequest(format!(
                "canvas must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            background: Background::default(),
            format: ImageFormat::default(),
        })
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }
}

/// A validated request to render text onto a canvas
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub text: String,
    pub font: FontSpec,
    pub canvas: CanvasSpec,
}

impl RenderRequest {
    pub fn new(text: impl Into<String>, font: FontSpec, canvas: CanvasSpec) -> Result<Self, RenderError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(RenderError::EmptyText);
        }
        if font.size == 0 {
            return Err(RenderError::InvalidRequest("font size must be positive".to_string()));
        }
        Ok(Self { text, font, canvas })
    }
}

/// Encoded image bytes plus format tag; cheap to clone, never mutated
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedImage {
    bytes: Arc<[u8]>,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl RenderedImage {
    pub fn new(bytes: Vec<u8>, format: ImageFormat, width: u32, height: u32) -> Self {
        Self {
            bytes: bytes.into(),
            format,
            width,
            height,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse() {
        assert_eq!("#ffffff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("102030".parse::<Color>().unwrap(), Color::rgb(0x10, 0x20, 0x30));
        assert_eq!("#00000080".parse::<Color>().unwrap(), Color([0, 0, 0, 0x80]));
        assert!("#fff".parse::<Color>().is_err());
        assert!("#gggggg".parse::<Color>().is_err());
        assert_eq!(Color::rgb(1, 2, 3).to_string(), "#010203");
    }

    #[test]
    fn test_request_rejects_blank_text() {
        let canvas = CanvasSpec::new(100, 100).unwrap();
        let err = RenderRequest::new("   \n\t", FontSpec::new("Liberation Sans", 24), canvas).unwrap_err();
        assert!(matches!(err, RenderError::EmptyText));
    }

    #[test]
    fn test_canvas_rejects_zero_dimension() {
        assert!(CanvasSpec::new(0, 10).is_err());
        assert!(CanvasSpec::new(10, 0).is_err());
        assert!(CanvasSpec::new(1, 1).is_ok());
    }

    #[test]
    fn test_image_format_parse() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!("gif".parse::<ImageFormat>().is_err());
    }
}
