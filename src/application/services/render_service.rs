//! Render service - font resolution plus layout and drawing on the pool

use std::sync::Arc;
use std::time::Duration;

use super::render_pool::RenderPool;
use crate::application::errors::RenderError;
use crate::domain::entities::{Background, CanvasSpec, Color, FontSpec, ImageFormat, RenderRequest, RenderedImage};
use crate::infrastructure::config::RenderConfig;
use crate::infrastructure::fonts::{normalize_family, FontHandle, FontStore};
use crate::infrastructure::rendering::{layout, Renderer, TextBlock};

/// Values used when a request does not specify them
#[derive(Debug, Clone)]
pub struct RenderDefaults {
    pub family: String,
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub background: Background,
}

impl From<&RenderConfig> for RenderDefaults {
    fn from(config: &RenderConfig) -> Self {
        let background = match &config.background_image {
            Some(path) => Background::Image(path.clone()),
            None => Background::Color(config.background_color),
        };
        Self {
            family: config.default_family.clone(),
            size: config.default_size,
            width: config.canvas_width,
            height: config.canvas_height,
            format: config.format,
            background,
        }
    }
}

/// Card typography relative to the default size
#[derive(Debug, Clone)]
pub struct CardStyle {
    pub title_family: String,
    pub title_scale: f32,
    pub footer_scale: f32,
    pub footer_color: Color,
}

impl Default for CardStyle {
    fn default() -> Self {
        Self {
            title_family: "Liberation Sans Bold".to_string(),
            title_scale: 2.0,
            footer_scale: 0.5,
            footer_color: Color::rgb(96, 96, 96),
        }
    }
}

/// Title, optional body and footer stacked on one canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub title: String,
    pub body: String,
    pub footer: String,
}

pub struct RenderService {
    fonts: Arc<FontStore>,
    renderer: Arc<Renderer>,
    pool: RenderPool,
    defaults: RenderDefaults,
    card: CardStyle,
}

impl RenderService {
    pub fn new(fonts: Arc<FontStore>, renderer: Renderer, pool: RenderPool, defaults: RenderDefaults) -> Self {
        Self {
            fonts,
            renderer: Arc::new(renderer),
            pool,
            defaults,
            card: CardStyle::default(),
        }
    }

    pub fn from_config(config: &RenderConfig, fonts: Arc<FontStore>) -> Self {
        let card = CardStyle {
            title_family: config.card.title_family.clone(),
            title_scale: config.card.title_scale,
            footer_scale: config.card.footer_scale,
            ..CardStyle::default()
        };

        Self::new(
            fonts,
            Renderer::from_config(config),
            RenderPool::new(config.worker_pool_size, config.render_queue_depth),
            RenderDefaults::from(config),
        )
        .with_card_style(card)
    }

    pub fn with_card_style(mut self, card: CardStyle) -> Self {
        self.card = card;
        self
    }

    pub fn defaults(&self) -> &RenderDefaults {
        &self.defaults
    }

    pub fn fonts(&self) -> &Arc<FontStore> {
        &self.fonts
    }

    pub fn pool(&self) -> &RenderPool {
        &self.pool
    }

    /// Default canvas, optionally resized
    pub fn canvas(&self, width: Option<u32>, height: Option<u32>) -> Result<CanvasSpec, RenderError> {
        let canvas = CanvasSpec::new(width.unwrap_or(self.defaults.width), height.unwrap_or(self.defaults.height))?
            .with_background(self.defaults.background.clone())
            .with_format(self.defaults.format);
        self.check_width(&canvas)?;
        Ok(canvas)
    }

    /// The canvas must leave room for text between the side paddings
    fn check_width(&self, canvas: &CanvasSpec) -> Result<(), RenderError> {
        let min = self.renderer.padding() * 2;
        if canvas.width <= min {
            return Err(RenderError::InvalidRequest(format!("width must be more than {}px", min)));
        }
        Ok(())
    }

    /// Default family first, then the loader's catalog, without duplicates
    pub fn families(&self) -> Vec<String> {
        let mut families = vec![self.defaults.family.clone()];
        for status in self.fonts.catalog() {
            let normalized = normalize_family(&status.family);
            if !families.iter().any(|f| normalize_family(f) == normalized) {
                families.push(status.family);
            }
        }
        families
    }

    pub fn knows_family(&self, family: &str) -> bool {
        let wanted = normalize_family(family);
        self.families().iter().any(|f| normalize_family(f) == wanted)
    }

    /// Request with every default applied
    pub fn request(&self, text: impl Into<String>) -> Result<RenderRequest, RenderError> {
        RenderRequest::new(
            text,
            FontSpec::new(self.defaults.family.clone(), self.defaults.size),
            self.canvas(None, None)?,
        )
    }

    /// Resolve the default font; a failure here is fatal at startup
    pub async fn check_default_font(&self) -> Result<FontHandle, RenderError> {
        self.fonts.resolve(&self.defaults.family, self.defaults.size).await
    }

    pub async fn render(&self, request: RenderRequest) -> Result<RenderedImage, RenderError> {
        self.check_width(&request.canvas)?;
        let font = self.fonts.resolve(&request.font.family, request.font.size).await?;
        let renderer = self.renderer.clone();

        self.pool
            .run(move || {
                let width = renderer.content_width(request.canvas.width);
                let text_layout = layout(&request.text, &font, width)?;
                renderer.render(&request, &text_layout, &font)
            })
            .await
    }

    pub async fn render_card(&self, card: Card, canvas: CanvasSpec) -> Result<RenderedImage, RenderError> {
        if card.title.trim().is_empty() {
            return Err(RenderError::EmptyText);
        }
        self.check_width(&canvas)?;

        let size = self.defaults.size;
        let title_size = scaled(size, self.card.title_scale);
        let title_font = match self.fonts.resolve(&self.card.title_family, title_size).await {
            Ok(font) => font,
            Err(RenderError::FontNotFound { family }) => {
                tracing::warn!("Card title font '{}' missing, using '{}'", family, self.defaults.family);
                self.fonts.resolve(&self.defaults.family, title_size).await?
            }
            Err(e) => return Err(e),
        };
        let body_font = self.fonts.resolve(&self.defaults.family, size).await?;
        let footer_font = self
            .fonts
            .resolve(&self.defaults.family, scaled(size, self.card.footer_scale))
            .await?;

        let renderer = self.renderer.clone();
        let footer_color = self.card.footer_color;

        self.pool
            .run(move || {
                let width = renderer.content_width(canvas.width);

                let mut blocks = vec![TextBlock::new(layout(&card.title, &title_font, width)?, &title_font)];
                if !card.body.trim().is_empty() {
                    blocks.push(TextBlock::new(layout(&card.body, &body_font, width)?, &body_font));
                }
                if !card.footer.trim().is_empty() {
                    let mut footer = TextBlock::new(layout(&card.footer, &footer_font, width)?, &footer_font);
                    footer.color = Some(footer_color);
                    blocks.push(footer);
                }

                renderer.render_blocks(&canvas, &blocks)
            })
            .await
    }

    /// Stop accepting renders and wait for running ones
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.pool.drain(timeout).await
    }
}

fn scaled(size: u32, scale: f32) -> u32 {
    ((size as f32 * scale).round() as u32).max(1)
}
