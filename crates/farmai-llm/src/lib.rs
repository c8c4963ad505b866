// Model access: chat completion, streaming, transcription, and the prompts
// and parsers for consulting reports and interview questions.

pub mod client;
pub mod events;
pub mod extract;
pub mod prompt;
pub mod questions;
pub mod report;

pub use client::{ChatClient, ChatSettings, LlmClient, LlmError, Transcription};
pub use events::LlmEvent;
