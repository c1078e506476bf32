use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use crate::orchestrator::config::RecognitionConfig;
use crate::orchestrator::traits::RecognitionService;
use crate::orchestrator::types::{RecognitionStream, TranscriptionEvent};

const PARTIAL_MARKER: char = '~';

/// 把每一帧当作 UTF-8 文本的识别器，供控制台调试与测试使用。
///
/// 以 `~` 开头的帧视为中间结果，其余视为最终结果；非法 UTF-8 会终止识别流。
#[derive(Debug, Clone, Default)]
pub struct TextFrameRecognizer {
    capacity: usize,
}

impl TextFrameRecognizer {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub(crate) fn parse(frame: &[u8]) -> Result<TranscriptionEvent> {
        let text = std::str::from_utf8(frame)
            .map_err(|err| anyhow!("audio frame is not valid UTF-8 text: {err}"))?
            .trim();

        Ok(match text.strip_prefix(PARTIAL_MARKER) {
            Some(partial) => TranscriptionEvent::partial(partial.trim()),
            None => TranscriptionEvent::final_text(text),
        })
    }
}

#[async_trait]
impl RecognitionService for TextFrameRecognizer {
    async fn open_stream(&self, config: &RecognitionConfig) -> Result<RecognitionStream> {
        let capacity = self.capacity.max(1);
        let (audio_tx, mut audio_rx) = mpsc::channel::<Bytes>(capacity);
        let (events_tx, events_rx) = mpsc::channel(capacity);
        debug!(
            target: "transcript_stream",
            encoding = %config.encoding,
            sample_rate_hz = config.sample_rate_hz,
            "opening text frame recognizer"
        );

        tokio::spawn(async move {
            while let Some(frame) = audio_rx.recv().await {
                let event = Self::parse(&frame);
                let failed = event.is_err();
                if events_tx.send(event).await.is_err() || failed {
                    break;
                }
            }
        });

        Ok(RecognitionStream {
            audio: audio_tx,
            events: events_rx,
        })
    }
}
