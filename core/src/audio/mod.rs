//! 来电音频到识别事件的适配层。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::orchestrator::config::RecognitionConfig;
use crate::orchestrator::error::MediatorError;
use crate::orchestrator::traits::RecognitionService;
use crate::orchestrator::types::{RecognitionStream, TranscriptionEvent};

const TARGET: &str = "transcript_stream";

/// Forwards raw audio to the recognition collaborator and relays its usable
/// results, in order, to a single subscriber. Not restartable: once the
/// underlying stream fails or is closed, transcription ends for the session.
pub struct TranscriptStream {
    audio_tx: Option<mpsc::Sender<Bytes>>,
    failed: Arc<AtomicBool>,
    relay: Option<JoinHandle<()>>,
}

impl TranscriptStream {
    pub async fn open(
        service: &dyn RecognitionService,
        config: &RecognitionConfig,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<TranscriptionEvent>)> {
        let RecognitionStream { audio, events } = service.open_stream(config).await?;
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let failed = Arc::new(AtomicBool::new(false));
        let relay = tokio::spawn(relay_events(events, events_tx, Arc::clone(&failed)));

        Ok((
            Self {
                audio_tx: Some(audio),
                failed,
                relay: Some(relay),
            },
            events_rx,
        ))
    }

    /// 转发一帧原始音频；流已失败或已关闭时仅记录日志。
    pub async fn feed(&self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }

        if self.has_failed() {
            debug!(target: TARGET, "dropping audio chunk after recognition failure");
            return;
        }

        let Some(audio_tx) = self.audio_tx.as_ref() else {
            debug!(target: TARGET, "dropping audio chunk after stream close");
            return;
        };

        if let Err(err) = audio_tx.send(chunk).await {
            self.failed.store(true, Ordering::SeqCst);
            warn!(
                target: TARGET,
                %err,
                "recognition stream no longer accepts audio"
            );
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.audio_tx.is_none()
    }

    /// 释放底层识别流，可重复调用。
    pub fn close(&mut self) {
        if self.audio_tx.take().is_some() {
            debug!(target: TARGET, "closing recognition stream");
        }
        if let Some(relay) = self.relay.take() {
            relay.abort();
        }
    }
}

impl Drop for TranscriptStream {
    fn drop(&mut self) {
        self.close();
    }
}

async fn relay_events(
    mut events: mpsc::Receiver<Result<TranscriptionEvent>>,
    events_tx: mpsc::Sender<TranscriptionEvent>,
    failed: Arc<AtomicBool>,
) {
    while let Some(next) = events.recv().await {
        match next {
            Ok(event) => {
                if !event.is_usable() {
                    continue;
                }
                if events_tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                failed.store(true, Ordering::SeqCst);
                let err = MediatorError::recognition(err);
                error!(target: TARGET, kind = err.kind(), %err, "transcription ended");
                break;
            }
        }
    }
}
