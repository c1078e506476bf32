use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::orchestrator::config::RecognitionConfig;
use crate::orchestrator::types::{OutboundMessage, RecognitionStream, ReplyRequest};

#[async_trait]
pub trait RecognitionService: Send + Sync {
    async fn open_stream(&self, config: &RecognitionConfig) -> Result<RecognitionStream>;
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, request: &ReplyRequest) -> Result<String>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes>;
}

/// 下行通道在连接关闭后静默丢弃消息。
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn deliver(&self, message: OutboundMessage);
}
