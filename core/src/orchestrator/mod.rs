//! 轮次控制与外部协作方编排。

mod constants;
mod engine;
mod runtime;

pub mod config;
pub mod error;
pub mod prompt;
pub mod traits;
pub mod types;

pub use config::{LanguageModelConfig, MediatorConfig, RecognitionConfig, SynthesisConfig};
pub use engine::{
    ChatCompletionGenerator, ConversationEngine, SpeechSynthesisClient, TextFrameRecognizer,
};
pub use error::MediatorError;
pub use prompt::PromptContext;
pub use runtime::SessionHandle;
pub use traits::{OutboundSink, RecognitionService, ReplyGenerator, SpeechSynthesizer};
pub use types::{
    AgentState, DialogueEntry, OutboundMessage, RecognitionStream, ReplyRequest, Role,
    TranscriptionEvent,
};

#[cfg(test)]
mod tests;
