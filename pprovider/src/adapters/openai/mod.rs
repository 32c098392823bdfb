//! Chat-completions adapter shared by every OpenAI-compatible backend.

mod decoder;
mod provider;
mod transport;
mod wire;

pub use decoder::ChatCompletionDecoder;
pub use provider::OpenAiCompatibleProvider;
pub use transport::{OPENAI_BASE_URL, OpenAiAuth, OpenAiHttpTransport, OpenAiTransport};
pub use wire::{
    ChatCompletionRequest, ImageUrl, StreamOptions, WireContent, WireFunction, WireMessage,
    WirePart, WireTool,
};
