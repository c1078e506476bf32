use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::orchestrator::config::MediatorConfig;
use crate::orchestrator::prompt::PromptContext;
use crate::orchestrator::runtime::{self, SessionHandle};
use crate::orchestrator::traits::{
    OutboundSink, RecognitionService, ReplyGenerator, SpeechSynthesizer,
};
use crate::session::lifecycle::SessionLifecycleUpdate;

pub use self::http::{ChatCompletionGenerator, SpeechSynthesisClient};
pub use self::text::TextFrameRecognizer;

/// 持有全部外部协作方，为每个来电连接启动一个独立会话。
pub struct ConversationEngine {
    config: MediatorConfig,
    prompt: Arc<PromptContext>,
    recognizer: Arc<dyn RecognitionService>,
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl ConversationEngine {
    /// 使用 HTTP 协作方（chat completion 与语音合成）构建引擎。
    pub fn new(config: MediatorConfig, recognizer: Arc<dyn RecognitionService>) -> Result<Self> {
        let prompt = PromptContext::from_config(&config)?;
        let generator = Arc::new(ChatCompletionGenerator::new(config.language_model.clone()));
        let synthesizer = Arc::new(SpeechSynthesisClient::new(config.synthesis.clone()));
        Ok(Self::with_components(
            config,
            prompt,
            recognizer,
            generator,
            synthesizer,
        ))
    }

    pub fn with_components(
        config: MediatorConfig,
        prompt: PromptContext,
        recognizer: Arc<dyn RecognitionService>,
        generator: Arc<dyn ReplyGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            config,
            prompt: Arc::new(prompt),
            recognizer,
            generator,
            synthesizer,
        }
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    pub async fn warmup(&self) -> Result<()> {
        info!(
            target: "conversation_engine",
            llm_model = %self.config.language_model.model,
            tts_voice = %self.config.synthesis.voice,
            knowledge_chars = self.prompt.knowledge_base().len(),
            "conversation engine ready"
        );
        Ok(())
    }

    pub async fn start_session(
        &self,
        session_id: &str,
        outbound: Arc<dyn OutboundSink>,
        lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
    ) -> Result<SessionHandle> {
        runtime::spawn_session(
            Arc::from(session_id),
            &self.config,
            Arc::clone(&self.prompt),
            self.recognizer.as_ref(),
            Arc::clone(&self.generator),
            Arc::clone(&self.synthesizer),
            outbound,
            lifecycle_tx,
        )
        .await
    }
}

mod http;
mod text;
