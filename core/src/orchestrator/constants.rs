pub(crate) const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub(crate) const DEFAULT_TTS_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_TTS_MODEL: &str = "tts-1";
pub(crate) const DEFAULT_TTS_VOICE: &str = "alloy";

pub(crate) const DEFAULT_PERSONA: &str = "You are a friendly receptionist answering a phone call. \
Reply in one or two short spoken sentences, never use lists or markdown, and only answer \
from the reference knowledge base. If you do not know something, offer to take a message.";
