//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

use crate::application::commands::HandlerKind;
use crate::application::errors::ConfigError;
use crate::domain::entities::{Color, ImageFormat};

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    /// Command name -> built-in handler
    pub commands: BTreeMap<String, HandlerKind>,
    pub render: RenderConfig,
    pub fonts: FontConfig,
    pub session: SessionConfig,
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub prefix: char,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RenderConfig {
    pub default_family: String,
    pub default_size: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Canvas height ceiling; renders that would grow past it are rejected
    pub max_render_height: u32,
    pub worker_pool_size: usize,
    pub render_queue_depth: usize,
    pub padding: u32,
    /// Vertical space between stacked text blocks
    pub block_gap: u32,
    pub format: ImageFormat,
    pub background_color: Color,
    pub background_image: Option<PathBuf>,
    pub text_color: Color,
    pub card: CardConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CardConfig {
    pub title_family: String,
    pub title_scale: f32,
    pub footer_scale: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FontConfig {
    /// Searched in order
    pub directories: Vec<PathBuf>,
    /// Family name -> font file name
    pub families: BTreeMap<String, String>,
    /// Use the built-in block typeface when a family has no installed file
    pub builtin_fallback: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionConfig {
    pub event_workers: usize,
    pub event_queue_depth: usize,
    pub drain_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AdaptersConfig {
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConsoleConfig {
    /// Where image replies are written
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let commands = [
            ("help", HandlerKind::Help),
            ("ping", HandlerKind::Ping),
            ("version", HandlerKind::Version),
            ("fonts", HandlerKind::Fonts),
            ("render", HandlerKind::Render),
            ("say", HandlerKind::Render),
            ("card", HandlerKind::Card),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();

        Self {
            bot: BotConfig::default(),
            commands,
            render: RenderConfig::default(),
            fonts: FontConfig::default(),
            session: SessionConfig::default(),
            adapters: AdaptersConfig::default(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "placard-bot".to_string(),
            prefix: '!',
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_family: "Liberation Sans".to_string(),
            default_size: 36,
            canvas_width: 1200,
            canvas_height: 240,
            max_render_height: 4096,
            worker_pool_size: 4,
            render_queue_depth: 16,
            padding: 40,
            block_gap: 24,
            format: ImageFormat::Png,
            background_color: Color::WHITE,
            background_image: None,
            text_color: Color::BLACK,
            card: CardConfig::default(),
        }
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            title_family: "Liberation Sans Bold".to_string(),
            title_scale: 2.0,
            footer_scale: 0.5,
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        let families = [
            ("Liberation Sans", "LiberationSans-Regular.ttf"),
            ("Liberation Sans Bold", "LiberationSans-Bold.ttf"),
            ("Liberation Serif", "LiberationSerif-Regular.ttf"),
            ("Liberation Mono", "LiberationMono-Regular.ttf"),
            ("Helvetica", "Helvetica.ttc"),
        ]
        .into_iter()
        .map(|(family, file)| (family.to_string(), file.to_string()))
        .collect();

        Self {
            directories: vec![
                PathBuf::from("/usr/share/fonts/truetype/liberation"),
                PathBuf::from("/usr/share/fonts/liberation"),
                PathBuf::from("/System/Library/Fonts"),
            ],
            families,
            builtin_fallback: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_workers: 8,
            event_queue_depth: 64,
            drain_timeout_secs: 10,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("renders"),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            self.bot.prefix = parse_prefix(&prefix)?;
        }
        if let Ok(workers) = std::env::var("RENDER_WORKERS") {
            self.render.worker_pool_size = parse_env("RENDER_WORKERS", &workers)?;
        }
        if let Ok(depth) = std::env::var("RENDER_QUEUE_DEPTH") {
            self.render.render_queue_depth = parse_env("RENDER_QUEUE_DEPTH", &depth)?;
        }
        if let Ok(height) = std::env::var("MAX_RENDER_HEIGHT") {
            self.render.max_render_height = parse_env("MAX_RENDER_HEIGHT", &height)?;
        }
        if let Ok(dir) = std::env::var("FONT_DIR") {
            self.fonts.directories.insert(0, PathBuf::from(dir));
        }

        Ok(self)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.is_whitespace() {
            return Err(ConfigError::InvalidValue("bot.prefix must not be whitespace".to_string()));
        }

        let render = &self.render;
        let positive = [
            ("render.default-size", render.default_size as u64),
            ("render.canvas-width", render.canvas_width as u64),
            ("render.canvas-height", render.canvas_height as u64),
            ("render.max-render-height", render.max_render_height as u64),
            ("render.worker-pool-size", render.worker_pool_size as u64),
            ("session.event-workers", self.session.event_workers as u64),
            ("session.event-queue-depth", self.session.event_queue_depth as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!("{} must be positive", field)));
            }
        }

        if render.canvas_height > render.max_render_height {
            return Err(ConfigError::InvalidValue(format!(
                "render.canvas-height ({}) exceeds render.max-render-height ({})",
                render.canvas_height, render.max_render_height
            )));
        }
        if render.padding.saturating_mul(2) >= render.canvas_width {
            return Err(ConfigError::InvalidValue(
                "render.padding leaves no room for text".to_string(),
            ));
        }
        if render.default_family.trim().is_empty() {
            return Err(ConfigError::MissingField("render.default-family".to_string()));
        }
        if !(render.card.title_scale > 0.0 && render.card.footer_scale > 0.0) {
            return Err(ConfigError::InvalidValue("render.card scales must be positive".to_string()));
        }

        if self.session.reconnect.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(
                "session.reconnect.multiplier must be at least 1.0".to_string(),
            ));
        }

        if self.commands.is_empty() {
            return Err(ConfigError::MissingField("commands".to_string()));
        }
        let mut seen = HashSet::new();
        for name in self.commands.keys() {
            let folded = name.trim().to_lowercase();
            if folded.is_empty() || folded.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidValue(format!("invalid command name '{}'", name)));
            }
            if !seen.insert(folded) {
                return Err(ConfigError::InvalidValue(format!("duplicate command name '{}'", name)));
            }
        }

        Ok(())
    }
}

fn parse_prefix(value: &str) -> Result<char, ConfigError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::InvalidValue(format!(
            "prefix must be a single character, got '{}'",
            value
        ))),
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{}={}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bot.prefix, '!');
        assert_eq!(config.commands.get("say"), Some(&HandlerKind::Render));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml(
            "bot:\n  prefix: '/'\nrender:\n  worker-pool-size: 2\n  render-queue-depth: 3\n",
        )
        .unwrap();

        assert_eq!(config.bot.prefix, '/');
        assert_eq!(config.bot.name, "placard-bot");
        assert_eq!(config.render.worker_pool_size, 2);
        assert_eq!(config.render.render_queue_depth, 3);
        assert_eq!(config.render.max_render_height, 4096);
        assert!(!config.commands.is_empty());
    }

    #[test]
    fn test_unknown_handler_kind_rejected() {
        let err = Config::from_yaml("commands:\n  hello: greet\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_duplicate_command_names_rejected() {
        let config = Config::from_yaml("commands:\n  render: render\n  Render: card\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_canvas_above_ceiling_rejected() {
        let mut config = Config::default();
        config.render.canvas_height = config.render.max_render_height + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip_keeps_colors() {
        let mut config = Config::default();
        config.render.text_color = Color::rgb(0x12, 0x34, 0x56);
        let yaml = config.to_yaml().unwrap();
        let back = Config::from_yaml(&yaml).unwrap();
        assert_eq!(back.render.text_color, config.render.text_color);
        assert_eq!(back.bot.prefix, config.bot.prefix);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "bot:\n  name: test-bot\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.bot.name, "test-bot");

        assert!(Config::load(dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_parse_prefix() {
        assert_eq!(parse_prefix("!").unwrap(), '!');
        assert!(parse_prefix("!!").is_err());
        assert!(parse_prefix("").is_err());
    }
}
