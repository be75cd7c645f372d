//! Image renderer - canvas, background, text, encoding

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;

use super::layout::TextLayout;
use crate::application::errors::RenderError;
use crate::domain::entities::{Background, CanvasSpec, Color, ImageFormat, RenderRequest, RenderedImage};
use crate::infrastructure::config::RenderConfig;
use crate::infrastructure::fonts::Typeface;

/// A laid-out block of text and the face that draws it
pub struct TextBlock<'a> {
    pub layout: TextLayout<'a>,
    pub face: &'a dyn Typeface,
    pub color: Option<Color>,
}

impl<'a> TextBlock<'a> {
    pub fn new(layout: TextLayout<'a>, face: &'a dyn Typeface) -> Self {
        Self {
            layout,
            face,
            color: None,
        }
    }

    fn height(&self) -> u32 {
        self.layout.height().ceil() as u32
    }
}

/// Draws text blocks onto a canvas and encodes the result
#[derive(Debug, Clone)]
pub struct Renderer {
    max_height: u32,
    padding: u32,
    block_gap: u32,
    text_color: Color,
}

impl Renderer {
    pub fn new(max_height: u32) -> Self {
        Self {
            max_height,
            padding: 40,
            block_gap: 24,
            text_color: Color::BLACK,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.max_render_height)
            .with_padding(config.padding)
            .with_block_gap(config.block_gap)
            .with_text_color(config.text_color)
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_block_gap(mut self, gap: u32) -> Self {
        self.block_gap = gap;
        self
    }

    pub fn with_text_color(mut self, color: Color) -> Self {
        self.text_color = color;
        self
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Width available to text on a canvas of `canvas_width`
    pub fn content_width(&self, canvas_width: u32) -> f32 {
        canvas_width.saturating_sub(self.padding * 2).max(1) as f32
    }

    /// Canvas height needed to fit every block, before comparing to the request
    pub fn required_height(&self, blocks: &[TextBlock<'_>]) -> u32 {
        let text: u32 = blocks.iter().map(TextBlock::height).sum();
        let gaps = self.block_gap * blocks.len().saturating_sub(1) as u32;
        self.padding * 2 + text + gaps
    }

    /// Render one laid-out text with its face
    pub fn render(&self, request: &RenderRequest, layout: &TextLayout<'_>, face: &dyn Typeface) -> Result<RenderedImage, RenderError> {
        self.render_blocks(&request.canvas, &[TextBlock::new(*layout, face)])
    }

    /// Render blocks stacked top to bottom.
    ///
    /// The canvas grows by exactly the overflow when the text does not fit the
    /// requested height; it never shrinks. Growth past the height ceiling is an
    /// error and nothing is drawn.
    pub fn render_blocks(&self, canvas: &CanvasSpec, blocks: &[TextBlock<'_>]) -> Result<RenderedImage, RenderError> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(RenderError::InvalidRequest("canvas must be at least 1x1".to_string()));
        }

        let height = canvas.height.max(self.required_height(blocks));
        if height > self.max_height {
            return Err(RenderError::RenderOverflow {
                required: height,
                limit: self.max_height,
            });
        }
        if height > canvas.height {
            tracing::debug!("Growing canvas from {}px to {}px", canvas.height, height);
        }

        let mut image = self.background(&canvas.background, canvas.width, height)?;

        let mut top = self.padding as f32;
        for block in blocks {
            let color = block.color.unwrap_or(self.text_color).to_rgba();
            for line in block.layout.lines() {
                block
                    .face
                    .draw_line(&mut image, self.padding as f32, top + line.baseline_y, &line.text, color);
            }
            top += block.height() as f32 + self.block_gap as f32;
        }

        let bytes = encode(image, canvas.format)?;
        Ok(RenderedImage::new(bytes, canvas.format, canvas.width, height))
    }

    fn background(&self, background: &Background, width: u32, height: u32) -> Result<RgbaImage, RenderError> {
        match background {
            Background::Color(color) => Ok(RgbaImage::from_pixel(width, height, color.to_rgba())),
            Background::Image(path) => {
                let source = image::open(path)
                    .map_err(|e| RenderError::Background(format!("{}: {}", path.display(), e)))?;
                Ok(source.resize_to_fill(width, height, FilterType::Triangle).to_rgba8())
            }
        }
    }
}

fn encode(image: RgbaImage, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);

    let result = match format {
        ImageFormat::Png => DynamicImage::ImageRgba8(image).write_to(&mut cursor, image::ImageFormat::Png),
        // JPEG has no alpha channel
        ImageFormat::Jpeg => {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image).to_rgb8()).write_to(&mut cursor, image::ImageFormat::Jpeg)
        }
    };
    result.map_err(|e| RenderError::Encode(e.to_string()))?;

    Ok(bytes)
}
