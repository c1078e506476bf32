use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestrator::constants::{
    DEFAULT_LLM_MODEL, DEFAULT_LLM_URL, DEFAULT_PERSONA, DEFAULT_TTS_MODEL, DEFAULT_TTS_URL,
    DEFAULT_TTS_VOICE,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    pub greeting: Option<String>,
    pub persona: String,
    pub knowledge_base_path: Option<PathBuf>,
    pub buffer_capacity: usize,
    pub recognition: RecognitionConfig,
    pub language_model: LanguageModelConfig,
    pub synthesis: SynthesisConfig,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            greeting: Some("Hi, thanks for calling! How can I help you today?".to_string()),
            persona: DEFAULT_PERSONA.to_string(),
            knowledge_base_path: None,
            buffer_capacity: 32,
            recognition: RecognitionConfig::default(),
            language_model: LanguageModelConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub encoding: String,
    pub sample_rate_hz: u32,
    pub language: String,
    pub interim_results: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            encoding: "mulaw".to_string(),
            sample_rate_hz: 8_000,
            language: "en-US".to_string(),
            interim_results: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageModelConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for LanguageModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 256,
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub base_url: String,
    pub model: String,
    pub voice: String,
    pub response_format: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TTS_URL.to_string(),
            model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_TTS_VOICE.to_string(),
            response_format: "wav".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl MediatorConfig {
    /// 读取可选的 JSON 配置文件，再叠加 `TURNWISE_*` 环境变量。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file: {}", path.display()))?;
                serde_json::from_str::<MediatorConfig>(&raw)
                    .with_context(|| format!("failed to parse config file: {}", path.display()))?
            }
            None => MediatorConfig::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_value("TURNWISE_LLM_URL") {
            self.language_model.base_url = value;
        }
        if let Some(value) = env_value("TURNWISE_LLM_MODEL") {
            self.language_model.model = value;
        }
        if let Some(value) = env_value("TURNWISE_TTS_URL") {
            self.synthesis.base_url = value;
        }
        if let Some(value) = env_value("TURNWISE_TTS_MODEL") {
            self.synthesis.model = value;
        }
        if let Some(value) = env_value("TURNWISE_TTS_VOICE") {
            self.synthesis.voice = value;
        }
        if let Some(value) = env_value("TURNWISE_KNOWLEDGE_BASE") {
            self.knowledge_base_path = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var("TURNWISE_GREETING") {
            // 显式设置为空字符串即关闭开场白。
            let trimmed = value.trim();
            self.greeting = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }

        let shared_key = env_value("OPENAI_API_KEY");
        if let Some(value) = env_value("TURNWISE_LLM_API_KEY").or_else(|| shared_key.clone()) {
            self.language_model.api_key = Some(value);
        }
        if let Some(value) = env_value("TURNWISE_TTS_API_KEY").or(shared_key) {
            self.synthesis.api_key = Some(value);
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
