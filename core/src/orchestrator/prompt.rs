use anyhow::{Context, Result};
use std::sync::Arc;

use crate::orchestrator::config::MediatorConfig;
use crate::orchestrator::types::{DialogueEntry, ReplyRequest};

/// 每个引擎共享的固定人设与知识库文档。
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    policy: Arc<str>,
    knowledge_base: Arc<str>,
}

impl PromptContext {
    pub fn new<P: Into<Arc<str>>, K: Into<Arc<str>>>(policy: P, knowledge_base: K) -> Self {
        Self {
            policy: policy.into(),
            knowledge_base: knowledge_base.into(),
        }
    }

    pub fn from_config(config: &MediatorConfig) -> Result<Self> {
        let knowledge_base = match config.knowledge_base_path.as_ref() {
            Some(path) => std::fs::read_to_string(path).with_context(|| {
                format!("failed to read knowledge base document: {}", path.display())
            })?,
            None => String::new(),
        };

        Ok(Self::new(config.persona.as_str(), knowledge_base))
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    pub fn knowledge_base(&self) -> &str {
        &self.knowledge_base
    }

    pub(crate) fn request(&self, history: Vec<DialogueEntry>) -> ReplyRequest {
        ReplyRequest {
            policy: self.policy.to_string(),
            knowledge_base: self.knowledge_base.to_string(),
            history,
        }
    }
}
