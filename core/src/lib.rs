//! Turnwise Core Library
//!
//! Real-time voice conversation mediator: relays caller audio to a streaming
//! recognizer, decides turn by turn when the agent speaks, and cancels agent
//! replies the caller talks over.

pub mod audio;
pub mod orchestrator;
pub mod session;
pub mod telemetry;
