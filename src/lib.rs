//! placard-bot - a chat command bot that renders text to images

pub mod application;
pub mod domain;
pub mod infrastructure;
