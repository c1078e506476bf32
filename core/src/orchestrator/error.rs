use thiserror::Error;

/// 会话内可恢复的协作方故障，均不会终止会话。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediatorError {
    #[error("recognition stream failed: {0}")]
    RecognitionStream(String),
    #[error("reply generation failed: {0}")]
    ReplyGeneration(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

impl MediatorError {
    pub fn kind(&self) -> &'static str {
        match self {
            MediatorError::RecognitionStream(_) => "recognition_stream",
            MediatorError::ReplyGeneration(_) => "reply_generation",
            MediatorError::Synthesis(_) => "synthesis",
        }
    }

    pub(crate) fn reply(err: anyhow::Error) -> Self {
        MediatorError::ReplyGeneration(format!("{err:#}"))
    }

    pub(crate) fn synthesis(err: anyhow::Error) -> Self {
        MediatorError::Synthesis(format!("{err:#}"))
    }

    pub(crate) fn recognition(err: anyhow::Error) -> Self {
        MediatorError::RecognitionStream(format!("{err:#}"))
    }
}
