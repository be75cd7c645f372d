//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Connection lost after {attempts} reconnect attempts")]
    ConnectionLost { attempts: u32 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Font, layout and rendering errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Font not found: {family}")]
    FontNotFound { family: String },

    #[error("Invalid font {family}: {reason}")]
    InvalidFont { family: String, reason: String },

    #[error("Nothing to render: text is empty")]
    EmptyText,

    #[error("Invalid render request: {0}")]
    InvalidRequest(String),

    #[error("Rendered image would be {required}px tall, limit is {limit}px")]
    RenderOverflow { required: u32, limit: u32 },

    #[error("Background error: {0}")]
    Background(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Render queue full ({capacity} jobs admitted)")]
    Busy { capacity: u32 },

    #[error("Renderer is shutting down")]
    ShuttingDown,

    #[error("Render worker failed: {0}")]
    Worker(String),
}

impl RenderError {
    /// True for problems caused by the request rather than the process
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RenderError::FontNotFound { .. }
                | RenderError::EmptyText
                | RenderError::InvalidRequest(_)
                | RenderError::RenderOverflow { .. }
                | RenderError::Busy { .. }
                | RenderError::ShuttingDown
        )
    }

    /// Message safe to show to a chat user
    pub fn user_message(&self) -> String {
        match self {
            RenderError::FontNotFound { family } => format!("Font '{}' is not installed.", family),
            RenderError::EmptyText => "Nothing to render: give me some text.".to_string(),
            RenderError::InvalidRequest(reason) => format!("Invalid request: {}", reason),
            RenderError::RenderOverflow { limit, .. } => {
                format!("That text is too long to render (limit {}px tall).", limit)
            }
            RenderError::Busy { .. } => "Too many renders in progress. Please try again shortly.".to_string(),
            RenderError::ShuttingDown => "The bot is shutting down.".to_string(),
            RenderError::InvalidFont { .. }
            | RenderError::Background(_)
            | RenderError::Encode(_)
            | RenderError::Worker(_) => "Rendering failed.".to_string(),
        }
    }
}

/// Command handler errors
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Usage: {0}")]
    Usage(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn is_user_error(&self) -> bool {
        match self {
            HandlerError::Usage(_) => true,
            HandlerError::Render(e) => e.is_user_error(),
            HandlerError::Internal(_) => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            HandlerError::Usage(usage) => format!("Usage: {}", usage),
            HandlerError::Render(e) => e.user_message(),
            HandlerError::Internal(_) => "Something went wrong handling that command.".to_string(),
        }
    }
}

/// Messaging transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
