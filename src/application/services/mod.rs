//! Application services - Rendering, worker pool and the bot session

pub mod backoff;
pub mod render_pool;
pub mod render_service;
pub mod session;

pub use backoff::ReconnectPolicy;
pub use render_pool::RenderPool;
pub use render_service::{Card, CardStyle, RenderDefaults, RenderService};
pub use session::{BotSession, SessionSettings, SessionState};
