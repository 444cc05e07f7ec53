//! HTTP request handlers.

pub mod chat;
pub mod health;

pub use chat::{chat_callback, chat_result, start_chat};
pub use health::{health_check, readiness_check};
