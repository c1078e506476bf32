use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::orchestrator::types::{AgentState, TranscriptionEvent};
use crate::session::history::DialogueHistory;

/// 单轮 Agent 回复的标识，流水线在每个检查点凭它判断自己是否仍然有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TurnTicket {
    id: u64,
}

impl TurnTicket {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

/// 处理一个识别事件后的动作。
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct TurnDecision {
    /// 被打断的轮次；调用方需要向下行通道发送停止播放信号。
    pub(crate) cancelled: Option<TurnTicket>,
    /// 新开始的轮次；调用方需要先写入来电方发言再启动流水线。
    pub(crate) started: Option<TurnTicket>,
}

/// Turn-taking state machine. Pure and synchronous: every side effect is
/// returned as a [`TurnDecision`] for the session worker to carry out.
#[derive(Debug)]
pub(crate) struct TurnController {
    state: AgentState,
    current: Option<TurnTicket>,
    next_id: u64,
    /// 会话句柄持有同一个标记，丢弃句柄时无需拿锁即可作废进行中的轮次。
    closed: Arc<AtomicBool>,
}

impl Default for TurnController {
    fn default() -> Self {
        Self {
            state: AgentState::Idle,
            current: None,
            next_id: 1,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl TurnController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> AgentState {
        self.state
    }

    pub(crate) fn observe(&mut self, event: &TranscriptionEvent) -> TurnDecision {
        let mut decision = TurnDecision::default();
        if self.is_closed() || !event.is_usable() {
            return decision;
        }

        if self.state == AgentState::AgentSpeaking {
            self.state = AgentState::Interrupted;
            decision.cancelled = self.current;
        }

        if event.is_final {
            if self.state == AgentState::Interrupted {
                self.state = AgentState::Idle;
            }
            decision.started = self.begin_turn();
        }

        decision
    }

    /// Starts a turn from `Idle`; refuses while another turn is running.
    pub(crate) fn begin_turn(&mut self) -> Option<TurnTicket> {
        if self.is_closed() || self.state != AgentState::Idle {
            return None;
        }

        let ticket = TurnTicket { id: self.next_id };
        self.next_id += 1;
        self.current = Some(ticket);
        self.state = AgentState::AgentSpeaking;
        Some(ticket)
    }

    pub(crate) fn is_current(&self, ticket: TurnTicket) -> bool {
        !self.is_closed() && self.state == AgentState::AgentSpeaking && self.current == Some(ticket)
    }

    /// 轮次失败或开场白结束时清除“正在说话”标记；过期的轮次不会影响当前状态。
    pub(crate) fn release(&mut self, ticket: TurnTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state = AgentState::Idle;
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    pub(crate) fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.state = AgentState::Idle;
    }
}

/// 会话独占的可变状态，流水线与事件循环共用同一把锁。
#[derive(Debug, Default)]
pub(crate) struct ConversationState {
    pub(crate) history: DialogueHistory,
    pub(crate) controller: TurnController,
}
