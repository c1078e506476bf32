use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use turnwise_core::orchestrator::{
    ConversationEngine, MediatorConfig, OutboundMessage, TextFrameRecognizer,
};
use turnwise_core::session::outbound::ChannelOutbound;
use turnwise_core::session::SessionManager;
use turnwise_core::telemetry::init_tracing;

/// 控制台调试入口：stdin 每行视为一帧识别文本（`~` 开头为中间结果）。
#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_tracing();

    let config_path = std::env::var_os("TURNWISE_CONFIG").map(PathBuf::from);
    let config = MediatorConfig::load(config_path.as_deref())?;
    let output_dir = std::env::var_os("TURNWISE_OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("turnwise-out"));
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let recognizer = Arc::new(TextFrameRecognizer::new(config.buffer_capacity));
    let manager = SessionManager::new(ConversationEngine::new(config, recognizer)?);
    manager.run().await?;

    let config = manager.engine().config();
    let extension = config.synthesis.response_format.clone();
    let (outbound, mut outbound_rx) = ChannelOutbound::channel(config.buffer_capacity);
    let playback = tokio::spawn(async move {
        let mut index = 0usize;
        while let Some(message) = outbound_rx.recv().await {
            match message {
                OutboundMessage::Audio(audio) => {
                    index += 1;
                    let path = output_dir.join(format!("reply-{index:03}.{extension}"));
                    match tokio::fs::write(&path, &audio).await {
                        Ok(()) => info!(path = %path.display(), bytes = audio.len(), "agent audio written"),
                        Err(err) => warn!(%err, path = %path.display(), "failed to write agent audio"),
                    }
                }
                OutboundMessage::StopPlayback => info!("stop playback"),
            }
        }
    });

    let mut session = manager.connect(Arc::new(outbound)).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        session.feed(Bytes::from(line)).await;
    }

    session.close().await;
    drop(session);
    drop(manager);
    if let Err(err) = playback.await {
        warn!(%err, "playback task ended abnormally");
    }
    Ok(())
}
