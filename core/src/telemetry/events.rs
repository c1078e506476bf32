use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) const TARGET: &str = "telemetry::turns";
pub(crate) const EVENT_STARTED: &str = "turn_started";
pub(crate) const EVENT_INTERRUPTED: &str = "turn_interrupted";
pub(crate) const EVENT_CANCELLED: &str = "turn_cancelled";
pub(crate) const EVENT_FAILED: &str = "turn_failed";
pub(crate) const EVENT_DELIVERED: &str = "turn_delivered";

#[derive(Debug, Serialize)]
pub struct TurnStartedEvent<'a> {
    pub session_id: &'a str,
    pub turn_id: u64,
    pub utterance_chars: usize,
}

#[derive(Debug, Serialize)]
pub struct TurnInterruptedEvent<'a> {
    pub session_id: &'a str,
    pub turn_id: u64,
}

#[derive(Debug, Serialize)]
pub struct TurnCancelledEvent<'a> {
    pub session_id: &'a str,
    pub turn_id: u64,
    pub checkpoint: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TurnFailedEvent<'a> {
    pub session_id: &'a str,
    pub turn_id: u64,
    pub kind: &'static str,
    pub error: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TurnDeliveredEvent<'a> {
    pub session_id: &'a str,
    pub turn_id: u64,
    pub latency_ms: u64,
    pub audio_bytes: usize,
}

pub fn record_turn_started(session_id: &str, turn_id: u64, utterance_chars: usize) {
    let event = TurnStartedEvent {
        session_id,
        turn_id,
        utterance_chars,
    };
    emit(EVENT_STARTED, session_id, turn_id, &event);
}

pub fn record_turn_interrupted(session_id: &str, turn_id: u64) {
    let event = TurnInterruptedEvent {
        session_id,
        turn_id,
    };
    emit(EVENT_INTERRUPTED, session_id, turn_id, &event);
}

pub fn record_turn_cancelled(session_id: &str, turn_id: u64, checkpoint: &'static str) {
    let event = TurnCancelledEvent {
        session_id,
        turn_id,
        checkpoint,
    };
    emit(EVENT_CANCELLED, session_id, turn_id, &event);
}

pub fn record_turn_failed(session_id: &str, turn_id: u64, kind: &'static str, error: &str) {
    let event = TurnFailedEvent {
        session_id,
        turn_id,
        kind,
        error,
    };
    emit(EVENT_FAILED, session_id, turn_id, &event);
}

pub fn record_turn_delivered(
    session_id: &str,
    turn_id: u64,
    latency: Duration,
    audio_bytes: usize,
) {
    let event = TurnDeliveredEvent {
        session_id,
        turn_id,
        latency_ms: duration_to_ms(latency),
        audio_bytes,
    };
    emit(EVENT_DELIVERED, session_id, turn_id, &event);
}

fn emit<T: Serialize>(name: &'static str, session_id: &str, turn_id: u64, event: &T) {
    match serde_json::to_string(event) {
        Ok(payload) => info!(
            target: TARGET,
            event = name,
            session_id,
            turn_id,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = name,
            %err,
            "failed to encode turn event"
        ),
    }
}

pub(crate) fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}
