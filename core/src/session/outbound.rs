use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::orchestrator::traits::OutboundSink;
use crate::orchestrator::types::OutboundMessage;

/// 基于 mpsc 的下行通道；接收端关闭后静默丢弃。
#[derive(Debug, Clone)]
pub struct ChannelOutbound {
    tx: mpsc::Sender<OutboundMessage>,
}

impl ChannelOutbound {
    pub fn new(tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl OutboundSink for ChannelOutbound {
    async fn deliver(&self, message: OutboundMessage) {
        if self.tx.send(message).await.is_err() {
            debug!(target: "session_manager", "outbound channel closed, dropping message");
        }
    }
}
