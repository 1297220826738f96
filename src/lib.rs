//! iMessage AI relay — watches Messages.app and replies through an LLM.

pub mod config;
pub mod conversation;
pub mod error;
pub mod relay;
pub mod responder;
pub mod sink;
pub mod source;
