use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};

use super::{CommandHandler, HandlerKind, Invocation};
use crate::application::errors::HandlerError;
use crate::application::services::{Card, RenderService};
use crate::domain::entities::{FontSpec, ImageFormat, RenderRequest, Reply};

const MAX_WIDTH: u32 = 4096;
const MAX_FONT_SIZE: u32 = 512;

/// `Oct 17, 2026 3:05 PM`
pub fn format_timestamp<Tz>(ts: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    ts.format("%b %-d, %Y %-I:%M %p").to_string()
}

/// Leading `--key=value` options followed by the text to render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderArgs {
    pub text: String,
    pub family: Option<String>,
    pub size: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<ImageFormat>,
}

impl RenderArgs {
    pub fn parse(args: &[String]) -> Result<Self, HandlerError> {
        let mut parsed = Self::default();
        let mut rest = args;

        while let Some((first, tail)) = rest.split_first() {
            let Some(option) = first.strip_prefix("--") else {
                break;
            };
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| HandlerError::Usage(format!("--{} needs a value, e.g. --{}=…", option, option)))?;

            match key {
                "font" => parsed.family = Some(value.replace('_', " ")),
                "size" => parsed.size = Some(number(key, value, MAX_FONT_SIZE)?),
                "width" => parsed.width = Some(number(key, value, MAX_WIDTH)?),
                "height" => parsed.height = Some(number(key, value, u32::MAX)?),
                "format" => parsed.format = Some(value.parse().map_err(HandlerError::Usage)?),
                _ => return Err(HandlerError::Usage(format!("unknown option --{}", key))),
            }
            rest = tail;
        }

        parsed.text = rest.join(" ");
        Ok(parsed)
    }
}

fn number(key: &str, value: &str, max: u32) -> Result<u32, HandlerError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 && n <= max => Ok(n),
        _ => Err(HandlerError::Usage(format!("--{} must be a number between 1 and {}", key, max))),
    }
}

/// `render [options] <text>`
pub struct RenderHandler {
    render: Arc<RenderService>,
}

impl RenderHandler {
    pub fn new(render: Arc<RenderService>) -> Self {
        Self { render }
    }
}

#[async_trait]
impl CommandHandler for RenderHandler {
    async fn handle(&self, invocation: Invocation) -> Result<Reply, HandlerError> {
        let args = RenderArgs::parse(&invocation.command.args)?;
        if args.text.trim().is_empty() {
            return Err(HandlerError::Usage(format!(
                "{}{} {}",
                invocation.prefix,
                invocation.command.name,
                HandlerKind::Render.usage()
            )));
        }

        if let Some(family) = &args.family {
            if !self.render.knows_family(family) {
                return Err(HandlerError::Usage(format!(
                    "Unknown font '{}'. Available: {}",
                    family,
                    self.render.families().join(", ")
                )));
            }
        }

        let defaults = self.render.defaults();
        let mut canvas = self.render.canvas(args.width, args.height)?;
        if let Some(format) = args.format {
            canvas = canvas.with_format(format);
        }
        let font = FontSpec::new(
            args.family.unwrap_or_else(|| defaults.family.clone()),
            args.size.unwrap_or(defaults.size),
        );

        let request = RenderRequest::new(args.text, font, canvas)?;
        let image = self.render.render(request).await?;

        tracing::debug!("[{}] Rendered {:?}", invocation.conversation, image);
        Ok(Reply::image(image))
    }
}

/// Split `Title words | body words` at the first `|`
pub fn parse_card(text: &str) -> (String, String) {
    match text.split_once('|') {
        Some((title, body)) => (title.trim().to_string(), body.trim().to_string()),
        None => (text.trim().to_string(), String::new()),
    }
}

/// `card <title> [| body]` with a generated-at footer
pub struct CardHandler {
    render: Arc<RenderService>,
}

impl CardHandler {
    pub fn new(render: Arc<RenderService>) -> Self {
        Self { render }
    }
}

#[async_trait]
impl CommandHandler for CardHandler {
    async fn handle(&self, invocation: Invocation) -> Result<Reply, HandlerError> {
        let (title, body) = parse_card(&invocation.command.rest());
        if title.is_empty() {
            return Err(HandlerError::Usage(format!(
                "{}{} {}",
                invocation.prefix,
                invocation.command.name,
                HandlerKind::Card.usage()
            )));
        }

        let caption = title.clone();
        let card = Card {
            title,
            body,
            footer: format!("Generated {}", format_timestamp(&Local::now())),
        };
        let canvas = self.render.canvas(None, None)?;
        let image = self.render.render_card(card, canvas).await?;

        Ok(Reply::image(image).with_caption(caption))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::RenderError;
    use crate::domain::entities::{Command, ConversationId};
    use crate::infrastructure::config::RenderConfig;
    use crate::infrastructure::fonts::{DiskFontLoader, FontStore};
    use chrono::{NaiveDate, Utc};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn service(max_height: u32) -> Arc<RenderService> {
        service_with(max_height, DiskFontLoader::new(vec![]).with_builtin_fallback(true))
    }

    fn service_with(max_height: u32, loader: DiskFontLoader) -> Arc<RenderService> {
        let config = RenderConfig {
            default_size: 10,
            canvas_width: 200,
            canvas_height: 60,
            max_render_height: max_height,
            padding: 10,
            ..RenderConfig::default()
        };
        Arc::new(RenderService::from_config(&config, Arc::new(FontStore::new(loader))))
    }

    fn invocation(name: &str, raw: &[&str]) -> Invocation {
        Invocation {
            command: Command::new(name, args(raw)),
            conversation: ConversationId::new("chat"),
            prefix: '!',
        }
    }

    #[test]
    fn test_timestamp_format() {
        let ts = NaiveDate::from_ymd_opt(2026, 10, 7)
            .unwrap()
            .and_hms_opt(15, 5, 0)
            .unwrap()
            .and_utc();
        assert_eq!(format_timestamp(&ts), "Oct 7, 2026 3:05 PM");

        let midnight = Utc.with_ymd_and_hms(2026, 1, 31, 0, 30, 0).unwrap();
        assert_eq!(format_timestamp(&midnight), "Jan 31, 2026 12:30 AM");
    }

    #[test]
    fn test_parse_render_options() {
        let parsed = RenderArgs::parse(&args(&[
            "--font=Liberation_Serif",
            "--size=48",
            "--format=jpeg",
            "Hello",
            "--size=1",
        ]))
        .unwrap();

        assert_eq!(parsed.family.as_deref(), Some("Liberation Serif"));
        assert_eq!(parsed.size, Some(48));
        assert_eq!(parsed.format, Some(ImageFormat::Jpeg));
        assert_eq!(parsed.text, "Hello --size=1");
    }

    #[test]
    fn test_bad_options_are_usage_errors() {
        let cases = [
            ["--size=0", "x"],
            ["--size=big", "x"],
            ["--width=99999", "x"],
            ["--colour=red", "x"],
            ["--font", "x"],
            ["--format=gif", "x"],
        ];
        for raw in cases {
            let err = RenderArgs::parse(&args(&raw)).unwrap_err();
            assert!(matches!(err, HandlerError::Usage(_)), "{:?}", raw);
        }
    }

    #[test]
    fn test_parse_card() {
        assert_eq!(parse_card("Weekly report | all good"), ("Weekly report".to_string(), "all good".to_string()));
        assert_eq!(parse_card("Just a title"), ("Just a title".to_string(), String::new()));
        assert_eq!(parse_card("a | b | c"), ("a".to_string(), "b | c".to_string()));
    }

    #[tokio::test]
    async fn test_render_returns_image() {
        let handler = RenderHandler::new(service(1000));
        let reply = handler.handle(invocation("render", &["--width=300", "hello", "world"])).await.unwrap();

        let image = reply.as_image().unwrap();
        assert_eq!(image.width(), 300);
        assert_eq!(image.height(), 60);
        assert_eq!(image.format(), ImageFormat::Png);
        assert!(image.bytes().starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn test_render_without_text_shows_usage() {
        let handler = RenderHandler::new(service(1000));
        let err = handler.handle(invocation("say", &["--size=20"])).await.unwrap_err();
        assert!(err.user_message().starts_with("Usage: !say "));
    }

    #[tokio::test]
    async fn test_render_overflow() {
        let handler = RenderHandler::new(service(80));
        let words: Vec<&str> = std::iter::repeat("overflowing").take(40).collect();
        let err = handler.handle(invocation("render", &words)).await.unwrap_err();
        assert!(matches!(err, HandlerError::Render(RenderError::RenderOverflow { limit: 80, .. })));
        assert!(err.is_user_error());
    }

    #[tokio::test]
    async fn test_card_reply() {
        let handler = CardHandler::new(service(1000));
        let reply = handler.handle(invocation("card", &["Status", "|", "all", "good"])).await.unwrap();
        let image = reply.as_image().unwrap();
        assert_eq!(image.width(), 200);

        let err = handler.handle(invocation("card", &["|", "body only"])).await.unwrap_err();
        assert!(matches!(err, HandlerError::Usage(_)));
    }

    #[tokio::test]
    async fn test_unknown_font_lists_families() {
        let loader = DiskFontLoader::new(vec![])
            .with_family("Liberation Mono", "LiberationMono-Regular.ttf")
            .with_builtin_fallback(true);
        let render = service_with(1000, loader);
        let handler = RenderHandler::new(render.clone());

        let err = handler
            .handle(invocation("render", &["--font=Comic_Sans", "hello"]))
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            HandlerError::Usage(msg) if msg == "Unknown font 'Comic Sans'. Available: Liberation Sans, Liberation Mono"
        ));
        assert_eq!(render.fonts().entry_count(), 0);

        let reply = handler
            .handle(invocation("render", &["--font=liberation_mono", "hello"]))
            .await
            .unwrap();
        assert!(reply.as_image().is_some());
    }

    #[tokio::test]
    async fn test_width_inside_padding_is_rejected() {
        let handler = RenderHandler::new(service(1000));
        let err = handler.handle(invocation("render", &["--width=20", "hi"])).await.unwrap_err();
        assert!(matches!(err, HandlerError::Render(RenderError::InvalidRequest(_))));
        assert!(err.is_user_error());
    }
}
