// Events emitted by a streaming chat request.

/// One step of a streamed model response. Every variant carries the
/// generation of the request that produced it so the receiver can drop
/// output from requests it has since abandoned.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    /// A chunk of response text.
    Token { text: String, generation: u64 },
    /// The stream finished; `full_text` is the concatenation of all tokens.
    Complete { full_text: String, generation: u64 },
    Error { message: String, generation: u64 },
}

impl LlmEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LlmEvent::Token { generation, .. }
            | LlmEvent::Complete { generation, .. }
            | LlmEvent::Error { generation, .. } => *generation,
        }
    }
}
