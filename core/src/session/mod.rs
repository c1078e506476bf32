//! 来电会话管理。

pub mod history;
pub mod lifecycle;
pub mod outbound;

use crate::orchestrator::{ConversationEngine, OutboundSink, SessionHandle};
use crate::session::lifecycle::{emit_lifecycle, SessionLifecyclePhase, SessionLifecycleUpdate};
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct SessionManager {
    engine: ConversationEngine,
    lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(engine: ConversationEngine) -> Self {
        let (lifecycle_tx, _) = broadcast::channel(32);
        Self {
            engine,
            lifecycle_tx,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn run(&self) -> Result<()> {
        info!(target: "session_manager", "running bootstrap tasks");
        self.engine.warmup().await
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<SessionLifecycleUpdate> {
        self.lifecycle_tx.subscribe()
    }

    /// 为新的来电连接创建会话；返回的句柄在连接断开时关闭。
    pub async fn connect(&self, outbound: Arc<dyn OutboundSink>) -> Result<SessionHandle> {
        let session_id = format!("session-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        emit_lifecycle(
            &self.lifecycle_tx,
            SessionLifecycleUpdate::new(&session_id, SessionLifecyclePhase::Connected),
        );

        match self
            .engine
            .start_session(&session_id, outbound, self.lifecycle_tx.clone())
            .await
        {
            Ok(handle) => {
                info!(target: "session_manager", %session_id, "session started");
                Ok(handle)
            }
            Err(err) => {
                warn!(
                    target: "session_manager",
                    %session_id,
                    err = %format!("{err:#}"),
                    "failed to start session"
                );
                emit_lifecycle(
                    &self.lifecycle_tx,
                    SessionLifecycleUpdate::new(&session_id, SessionLifecyclePhase::Closed),
                );
                Err(err)
            }
        }
    }
}
