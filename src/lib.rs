//! QA Bridge — answers chat-bot questions through a QA backend.

pub mod channels;
pub mod config;
pub mod error;
pub mod message;
pub mod prompts;
pub mod qa;
pub mod router;
pub mod trigger;
