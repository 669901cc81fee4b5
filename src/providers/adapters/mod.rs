//! Backend adapters: one [`TextProvider`](super::TextProvider) impl per wire.
//!
//! `command` shells out to an installed AI CLI; `http` speaks the
//! OpenAI-compatible chat-completions protocol. Nothing above this module
//! knows which one it is talking to.

pub mod command;
pub mod http;

pub use command::CommandProvider;
pub use http::OpenAiCompatProvider;
