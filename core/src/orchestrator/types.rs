use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// 对话历史中的发言方。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Caller,
    Agent,
}

impl Role {
    /// Chat completion 协议里的角色名。
    pub fn chat_role(&self) -> &'static str {
        match self {
            Role::Caller => "user",
            Role::Agent => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueEntry {
    pub role: Role,
    pub text: String,
}

impl DialogueEntry {
    pub fn caller<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Caller,
            text: text.into(),
        }
    }

    pub fn agent<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Agent,
            text: text.into(),
        }
    }
}

/// 识别服务推送的增量结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionEvent {
    pub text: String,
    pub is_final: bool,
}

impl TranscriptionEvent {
    pub fn partial<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    pub fn is_usable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// 下行到来电方的消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Audio(Bytes),
    StopPlayback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    AgentSpeaking,
    Interrupted,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::AgentSpeaking => "agent_speaking",
            AgentState::Interrupted => "interrupted",
        }
    }
}

/// 识别流的双向通道：上行音频，下行识别事件。
pub struct RecognitionStream {
    pub audio: mpsc::Sender<Bytes>,
    pub events: mpsc::Receiver<anyhow::Result<TranscriptionEvent>>,
}

#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub policy: String,
    pub knowledge_base: String,
    pub history: Vec<DialogueEntry>,
}

impl ReplyRequest {
    pub fn system_prompt(&self) -> String {
        let knowledge = self.knowledge_base.trim();
        if knowledge.is_empty() {
            return self.policy.clone();
        }

        format!(
            "{}\n\nReference knowledge base:\n{}",
            self.policy.trim_end(),
            knowledge
        )
    }
}
