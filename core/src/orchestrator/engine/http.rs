use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

use crate::orchestrator::config::{LanguageModelConfig, SynthesisConfig};
use crate::orchestrator::traits::{ReplyGenerator, SpeechSynthesizer};
use crate::orchestrator::types::ReplyRequest;

const TARGET: &str = "conversation_engine";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// OpenAI 兼容的 chat completion 客户端。
#[derive(Debug, Clone)]
pub struct ChatCompletionGenerator {
    config: LanguageModelConfig,
}

impl ChatCompletionGenerator {
    pub fn new(config: LanguageModelConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn encode(&self, request: &ReplyRequest) -> Result<String> {
        let system = request.system_prompt();
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: &system,
        });
        messages.extend(request.history.iter().map(|entry| ChatMessage {
            role: entry.role.chat_role(),
            content: &entry.text,
        }));

        let body = ChatCompletionBody {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages,
        };
        serde_json::to_string(&body).context("failed to encode chat completion request")
    }
}

#[async_trait]
impl ReplyGenerator for ChatCompletionGenerator {
    async fn generate(&self, request: &ReplyRequest) -> Result<String> {
        let body = self.encode(request)?;
        let url = self.endpoint();
        let api_key = self.config.api_key.clone();
        let request_timeout = self.config.request_timeout;

        let raw = tokio::task::spawn_blocking(move || {
            post_json(&url, api_key.as_deref(), &body, request_timeout)?
                .into_string()
                .context("failed to read chat completion response")
        })
        .await
        .context("chat completion task panicked")??;

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&raw).context("malformed chat completion response")?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if reply.is_empty() {
            return Err(anyhow!("language model returned an empty reply"));
        }

        debug!(target: TARGET, chars = reply.len(), "chat completion received");
        Ok(reply)
    }
}

/// OpenAI 兼容的 `/audio/speech` 合成客户端，音色与编码在构造时固定。
#[derive(Debug, Clone)]
pub struct SpeechSynthesisClient {
    config: SynthesisConfig,
}

impl SpeechSynthesisClient {
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechSynthesisClient {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        let body = serde_json::to_string(&SpeechBody {
            model: &self.config.model,
            voice: &self.config.voice,
            input: text,
            response_format: &self.config.response_format,
        })
        .context("failed to encode speech request")?;
        let url = self.endpoint();
        let api_key = self.config.api_key.clone();
        let request_timeout = self.config.request_timeout;

        let audio = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let response = post_json(&url, api_key.as_deref(), &body, request_timeout)?;
            let mut audio = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut audio)
                .context("failed to read synthesized audio")?;
            Ok(audio)
        })
        .await
        .context("speech synthesis task panicked")??;

        if audio.is_empty() {
            return Err(anyhow!("speech synthesis returned no audio"));
        }

        Ok(Bytes::from(audio))
    }
}

fn post_json(
    url: &str,
    api_key: Option<&str>,
    body: &str,
    request_timeout: Duration,
) -> Result<ureq::Response> {
    let mut request = ureq::post(url)
        .timeout(request_timeout)
        .set("Content-Type", "application/json");
    if let Some(key) = api_key {
        request = request.set("Authorization", &format!("Bearer {key}"));
    }

    match request.send_string(body) {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(status, response)) => {
            let detail = response.into_string().unwrap_or_default();
            Err(anyhow!(
                "{url} returned HTTP status {status}: {}",
                detail.trim()
            ))
        }
        Err(err) => Err(anyhow!("request to {url} failed: {err}")),
    }
}
