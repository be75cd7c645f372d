use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;

use placard_bot::application::commands::build_dispatcher;
use placard_bot::application::errors::BotError;
use placard_bot::application::services::{BotSession, RenderService, SessionSettings};
use placard_bot::domain::entities::{FontSpec, ImageFormat, RenderRequest};
use placard_bot::infrastructure::adapters::ConsoleTransport;
use placard_bot::infrastructure::config::Config;
use placard_bot::infrastructure::fonts::{DiskFontLoader, FontStore};

#[derive(Parser)]
#[command(name = "placard-bot")]
#[command(about = "A chat bot that renders text to images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Command prefix (overrides config)
    #[arg(short, long)]
    prefix: Option<char>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot on the console
    Run,
    /// Render text to an image file and exit
    Render {
        /// Output file; a .jpg/.jpeg extension selects JPEG
        #[arg(short, long)]
        out: PathBuf,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,

        /// Font family, e.g. "Liberation Serif"
        #[arg(long)]
        family: Option<String>,

        /// Font size in points
        #[arg(long)]
        size: Option<u32>,

        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => run_bot(&cli.config, cli.prefix),
        Commands::Render {
            out,
            width,
            height,
            family,
            size,
            text,
        } => load_config(&cli.config, cli.prefix).and_then(|config| {
            let font = FontSpec::new(
                family.unwrap_or_else(|| config.render.default_family.clone()),
                size.unwrap_or(config.render.default_size),
            );
            render_to_file(&config, &out, text.join(" "), font, width, height)
        }),
        Commands::Version => {
            println!("placard-bot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path, prefix: Option<char>) -> Result<Config, BotError> {
    let config = if path.exists() {
        Config::load(path)?
    } else {
        tracing::info!("No config at {}, using defaults", path.display());
        Config::default()
    };

    let mut config = config.apply_env()?;

    if let Some(prefix) = prefix {
        config.bot.prefix = prefix;
    }
    config.validate()?;
    Ok(config)
}

fn runtime() -> Result<tokio::runtime::Runtime, BotError> {
    tokio::runtime::Runtime::new().map_err(|e| BotError::Internal(format!("failed to start runtime: {}", e)))
}

fn render_service(config: &Config) -> Arc<RenderService> {
    let fonts = Arc::new(FontStore::new(DiskFontLoader::from_config(&config.fonts)));
    Arc::new(RenderService::from_config(&config.render, fonts))
}

fn run_bot(config_path: &Path, prefix: Option<char>) -> Result<(), BotError> {
    let config = load_config(config_path, prefix)?;
    tracing::info!("Starting {} (prefix '{}')", config.bot.name, config.bot.prefix);

    let rt = runtime()?;
    let result = rt.block_on(async {
        let render = render_service(&config);
        let font = render.check_default_font().await?;
        match font.source() {
            Some(path) => tracing::info!("Default font {} {}pt from {}", font.family(), font.size(), path.display()),
            None => tracing::warn!("Default font {} not installed, using the built-in block face", font.family()),
        }

        let dispatcher = Arc::new(build_dispatcher(&config, render.clone())?);
        let transport = Arc::new(ConsoleTransport::stdin(&config.adapters.console.output_dir));
        let session = BotSession::new(transport, dispatcher, SessionSettings::from(&config.session));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("Signal received, shutting down");
            let _ = shutdown_tx.send(true);
        });

        let result = session.run(shutdown_rx).await;
        if !render.drain(session.remaining_drain()).await {
            tracing::warn!("Render pool did not drain in time");
        }
        result
    });

    // stdin reads sit on a blocking thread that never returns on its own
    rt.shutdown_background();
    result
}

fn render_to_file(
    config: &Config,
    out: &Path,
    text: String,
    font: FontSpec,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(), BotError> {
    let format = match out.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.parse().unwrap_or(config.render.format),
        None => config.render.format,
    };

    let rt = runtime()?;
    let image = rt.block_on(async {
        let render = render_service(config);
        let canvas = render.canvas(width, height)?.with_format(format);
        let request = RenderRequest::new(text, font, canvas)?;
        render.render(request).await
    })?;

    std::fs::write(out, image.bytes())
        .map_err(|e| BotError::Internal(format!("failed to write {}: {}", out.display(), e)))?;

    let kind = match image.format() {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
    };
    println!("Wrote {}x{} {} to {}", image.width(), image.height(), kind, out.display());
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn init_config() -> Result<(), BotError> {
    let yaml = Config::default().to_yaml()?;
    println!("{}", yaml);
    println!("\nSave this to config.yaml and adjust as needed.");
    Ok(())
}
