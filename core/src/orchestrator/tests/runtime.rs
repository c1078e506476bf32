use crate::orchestrator::*;
use crate::session::lifecycle::{SessionLifecyclePhase, SessionLifecycleUpdate};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::time::{sleep, timeout, Instant};

const POLICY: &str = "You are the front desk of a car detailing shop.";
const KNOWLEDGE: &str = "Pet hair removal is $40.";
const SETTLE: Duration = Duration::from_millis(100);

/// Replies with "reply to <last caller utterance>", optionally waiting on a gate.
#[derive(Default)]
struct EchoGenerator {
    requests: Mutex<Vec<ReplyRequest>>,
    gate: Option<Arc<Semaphore>>,
    fail_on: Option<&'static str>,
}

impl EchoGenerator {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn failing_on(text: &'static str) -> Self {
        Self {
            fail_on: Some(text),
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<ReplyRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }
}

#[async_trait]
impl ReplyGenerator for EchoGenerator {
    async fn generate(&self, request: &ReplyRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("generator gate open").forget();
        }

        let last = request
            .history
            .iter()
            .rev()
            .find(|entry| entry.role == Role::Caller)
            .map(|entry| entry.text.clone())
            .unwrap_or_default();

        if self.fail_on == Some(last.as_str()) {
            return Err(anyhow!("model overloaded"));
        }

        Ok(format!("reply to {last}"))
    }
}

#[derive(Default)]
struct GatedSynthesizer {
    texts: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    fail_on: Option<&'static str>,
}

impl GatedSynthesizer {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn texts(&self) -> Vec<String> {
        self.texts.lock().expect("texts lock poisoned").clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for GatedSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        self.texts
            .lock()
            .expect("texts lock poisoned")
            .push(text.to_string());

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("synthesis gate open").forget();
        }

        if self.fail_on == Some(text) {
            return Err(anyhow!("voice unavailable"));
        }

        Ok(audio_for(text))
    }
}

#[derive(Default)]
struct RecordingOutbound {
    messages: Mutex<Vec<OutboundMessage>>,
}

#[async_trait]
impl OutboundSink for RecordingOutbound {
    async fn deliver(&self, message: OutboundMessage) {
        self.messages
            .lock()
            .expect("outbound lock poisoned")
            .push(message);
    }
}

fn audio_for(text: &str) -> Bytes {
    Bytes::from(format!("audio:{text}"))
}

fn audio(text: &str) -> OutboundMessage {
    OutboundMessage::Audio(audio_for(text))
}

#[derive(Debug)]
struct Snapshot {
    state: AgentState,
    history: Vec<DialogueEntry>,
    outbound: Vec<OutboundMessage>,
    replies_requested: usize,
    syntheses_requested: usize,
}

struct Harness {
    session: SessionHandle,
    generator: Arc<EchoGenerator>,
    synthesizer: Arc<GatedSynthesizer>,
    outbound: Arc<RecordingOutbound>,
    lifecycle: broadcast::Receiver<SessionLifecycleUpdate>,
}

impl Harness {
    async fn start(generator: EchoGenerator, synthesizer: GatedSynthesizer) -> Self {
        Self::start_with_greeting(generator, synthesizer, None).await
    }

    async fn start_with_greeting(
        generator: EchoGenerator,
        synthesizer: GatedSynthesizer,
        greeting: Option<&str>,
    ) -> Self {
        let generator = Arc::new(generator);
        let synthesizer = Arc::new(synthesizer);
        let outbound = Arc::new(RecordingOutbound::default());
        let config = MediatorConfig {
            greeting: greeting.map(str::to_string),
            ..MediatorConfig::default()
        };
        let engine = ConversationEngine::with_components(
            config,
            PromptContext::new(POLICY, KNOWLEDGE),
            Arc::new(TextFrameRecognizer::new(16)),
            generator.clone(),
            synthesizer.clone(),
        );
        let (lifecycle_tx, lifecycle) = broadcast::channel(16);
        let session = engine
            .start_session("session-test", outbound.clone(), lifecycle_tx)
            .await
            .expect("session starts");

        Self {
            session,
            generator,
            synthesizer,
            outbound,
            lifecycle,
        }
    }

    async fn say(&self, text: &str) {
        self.session.feed(Bytes::from(text.to_string())).await;
    }

    async fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.session.agent_state().await,
            history: self.session.history().await,
            outbound: self
                .outbound
                .messages
                .lock()
                .expect("outbound lock poisoned")
                .clone(),
            replies_requested: self.generator.requests().len(),
            syntheses_requested: self.synthesizer.texts().len(),
        }
    }

    async fn wait_for(&self, what: &str, check: impl Fn(&Snapshot) -> bool) -> Snapshot {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let snapshot = self.snapshot().await;
            if check(&snapshot) {
                return snapshot;
            }
            if Instant::now() >= deadline {
                panic!("timed out waiting for {what}: {snapshot:?}");
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn wait_for_phase(&mut self, phase: SessionLifecyclePhase) {
        timeout(Duration::from_secs(2), async {
            loop {
                let update = self.lifecycle.recv().await.expect("lifecycle channel open");
                if update.phase == phase {
                    return;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {phase:?}"));
    }
}

#[tokio::test]
async fn final_utterance_while_idle_runs_one_full_turn() {
    let harness = Harness::start(EchoGenerator::default(), GatedSynthesizer::default()).await;

    harness.say("I have dog hair in my car").await;
    let snapshot = harness
        .wait_for("audio delivery", |s| !s.outbound.is_empty())
        .await;

    let requests = harness.generator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].history,
        vec![DialogueEntry::caller("I have dog hair in my car")]
    );
    assert_eq!(requests[0].policy, POLICY);
    assert_eq!(requests[0].knowledge_base, KNOWLEDGE);

    assert_eq!(
        harness.synthesizer.texts(),
        vec!["reply to I have dog hair in my car".to_string()]
    );
    assert_eq!(
        snapshot.outbound,
        vec![audio("reply to I have dog hair in my car")]
    );
    assert_eq!(
        snapshot.history,
        vec![
            DialogueEntry::caller("I have dog hair in my car"),
            DialogueEntry::agent("reply to I have dog hair in my car"),
        ]
    );
    assert_eq!(snapshot.state, AgentState::AgentSpeaking);
}

#[tokio::test]
async fn partial_results_while_idle_are_ignored() {
    let harness = Harness::start(EchoGenerator::default(), GatedSynthesizer::default()).await;

    harness.say("~I have").await;
    harness.say("~I have dog").await;
    harness.say("   ").await;
    sleep(SETTLE).await;

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, AgentState::Idle);
    assert!(snapshot.history.is_empty());
    assert!(snapshot.outbound.is_empty());
    assert_eq!(snapshot.replies_requested, 0);
}

#[tokio::test]
async fn barge_in_during_synthesis_stops_playback_once_and_drops_audio() {
    let synth_gate = Arc::new(Semaphore::new(0));
    let harness = Harness::start(
        EchoGenerator::default(),
        GatedSynthesizer::gated(synth_gate.clone()),
    )
    .await;

    harness.say("I have dog hair in my car").await;
    harness
        .wait_for("synthesis request", |s| s.syntheses_requested == 1)
        .await;

    harness.say("~wait").await;
    harness.say("~wait a").await;
    harness.say("~wait a sec").await;
    harness
        .wait_for("interruption", |s| s.state == AgentState::Interrupted)
        .await;
    sleep(SETTLE).await;
    assert_eq!(
        harness.snapshot().await.outbound,
        vec![OutboundMessage::StopPlayback]
    );

    synth_gate.add_permits(1);
    sleep(SETTLE).await;
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.outbound, vec![OutboundMessage::StopPlayback]);
    assert_eq!(snapshot.state, AgentState::Interrupted);
    assert_eq!(
        snapshot.history,
        vec![
            DialogueEntry::caller("I have dog hair in my car"),
            DialogueEntry::agent("reply to I have dog hair in my car"),
        ]
    );

    harness.say("actually never mind").await;
    let snapshot = harness
        .wait_for("second synthesis", |s| s.syntheses_requested == 2)
        .await;
    assert_eq!(snapshot.state, AgentState::AgentSpeaking);
    assert_eq!(snapshot.replies_requested, 2);
    assert_eq!(
        snapshot.history[2],
        DialogueEntry::caller("actually never mind")
    );

    synth_gate.add_permits(1);
    let snapshot = harness
        .wait_for("second delivery", |s| s.outbound.len() == 2)
        .await;
    assert_eq!(
        snapshot.outbound,
        vec![
            OutboundMessage::StopPlayback,
            audio("reply to actually never mind"),
        ]
    );
}

#[tokio::test]
async fn cancellation_before_reply_skips_history_and_synthesis() {
    let reply_gate = Arc::new(Semaphore::new(0));
    let harness = Harness::start(
        EchoGenerator::gated(reply_gate.clone()),
        GatedSynthesizer::default(),
    )
    .await;

    harness.say("first question").await;
    harness
        .wait_for("first reply request", |s| s.replies_requested == 1)
        .await;
    harness.say("~hold on").await;
    harness
        .wait_for("interruption", |s| s.state == AgentState::Interrupted)
        .await;
    harness.say("second question").await;
    harness
        .wait_for("second reply request", |s| s.replies_requested == 2)
        .await;

    reply_gate.add_permits(2);
    let snapshot = harness
        .wait_for("second delivery", |s| s.outbound.len() == 2)
        .await;
    sleep(SETTLE).await;

    assert_eq!(
        harness.synthesizer.texts(),
        vec!["reply to second question".to_string()]
    );
    assert_eq!(
        snapshot.outbound,
        vec![
            OutboundMessage::StopPlayback,
            audio("reply to second question"),
        ]
    );
    assert_eq!(
        harness.session.history().await,
        vec![
            DialogueEntry::caller("first question"),
            DialogueEntry::caller("second question"),
            DialogueEntry::agent("reply to second question"),
        ]
    );
}

#[tokio::test]
async fn next_utterance_after_delivery_interrupts_then_answers() {
    let harness = Harness::start(EchoGenerator::default(), GatedSynthesizer::default()).await;

    harness.say("one").await;
    harness
        .wait_for("first delivery", |s| s.outbound.len() == 1)
        .await;
    harness.say("two").await;
    let snapshot = harness
        .wait_for("second delivery", |s| s.outbound.len() == 3)
        .await;

    assert_eq!(
        snapshot.outbound,
        vec![
            audio("reply to one"),
            OutboundMessage::StopPlayback,
            audio("reply to two"),
        ]
    );
    let roles: Vec<Role> = snapshot.history.iter().map(|entry| entry.role).collect();
    assert_eq!(
        roles,
        vec![Role::Caller, Role::Agent, Role::Caller, Role::Agent]
    );
}

#[tokio::test]
async fn reply_failure_clears_turn_without_content() {
    let harness = Harness::start(
        EchoGenerator::failing_on("are you open"),
        GatedSynthesizer::default(),
    )
    .await;

    harness.say("are you open").await;
    let snapshot = harness
        .wait_for("turn abandoned", |s| {
            s.replies_requested == 1 && s.state == AgentState::Idle
        })
        .await;
    assert_eq!(
        snapshot.history,
        vec![DialogueEntry::caller("are you open")]
    );
    assert!(snapshot.outbound.is_empty());
    assert_eq!(snapshot.syntheses_requested, 0);

    harness.say("hello?").await;
    let snapshot = harness
        .wait_for("next delivery", |s| !s.outbound.is_empty())
        .await;
    assert_eq!(snapshot.outbound, vec![audio("reply to hello?")]);
}

#[tokio::test]
async fn synthesis_failure_keeps_reply_in_history() {
    let synthesizer = GatedSynthesizer {
        fail_on: Some("reply to sing me a song"),
        ..GatedSynthesizer::default()
    };
    let harness = Harness::start(EchoGenerator::default(), synthesizer).await;

    harness.say("sing me a song").await;
    let snapshot = harness
        .wait_for("turn abandoned", |s| {
            s.syntheses_requested == 1 && s.state == AgentState::Idle
        })
        .await;

    assert_eq!(
        snapshot.history,
        vec![
            DialogueEntry::caller("sing me a song"),
            DialogueEntry::agent("reply to sing me a song"),
        ]
    );
    assert!(snapshot.outbound.is_empty());
}

#[tokio::test]
async fn greeting_plays_before_caller_input() {
    let harness = Harness::start_with_greeting(
        EchoGenerator::default(),
        GatedSynthesizer::default(),
        Some("Thanks for calling!"),
    )
    .await;

    harness.say("hi").await;
    let snapshot = harness
        .wait_for("reply delivery", |s| s.outbound.len() == 2)
        .await;

    assert_eq!(
        snapshot.outbound,
        vec![audio("Thanks for calling!"), audio("reply to hi")]
    );
    assert_eq!(
        harness.generator.requests()[0].history,
        vec![
            DialogueEntry::agent("Thanks for calling!"),
            DialogueEntry::caller("hi"),
        ]
    );
}

#[tokio::test]
async fn close_while_reply_pending_is_silent() {
    let reply_gate = Arc::new(Semaphore::new(0));
    let mut harness = Harness::start(
        EchoGenerator::gated(reply_gate.clone()),
        GatedSynthesizer::default(),
    )
    .await;

    harness.say("question").await;
    harness
        .wait_for("reply request", |s| s.replies_requested == 1)
        .await;

    harness.session.close().await;
    harness.session.close().await;
    harness.wait_for_phase(SessionLifecyclePhase::Closed).await;

    reply_gate.add_permits(1);
    harness.say("anyone there?").await;
    sleep(SETTLE).await;

    let snapshot = harness.snapshot().await;
    assert!(snapshot.outbound.is_empty());
    assert_eq!(snapshot.history, vec![DialogueEntry::caller("question")]);
    assert_eq!(snapshot.syntheses_requested, 0);
}

#[tokio::test]
async fn recognition_failure_ends_transcription_but_not_session() {
    let mut harness =
        Harness::start(EchoGenerator::default(), GatedSynthesizer::default()).await;

    harness.session.feed(Bytes::from_static(&[0xff, 0xfe])).await;
    harness
        .wait_for_phase(SessionLifecyclePhase::TranscriptionLost)
        .await;

    harness.say("hello").await;
    sleep(SETTLE).await;
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.replies_requested, 0);
    assert!(snapshot.history.is_empty());
    assert!(!harness.session.is_closed());
}

#[tokio::test]
async fn failed_greeting_still_leaves_controller_idle() {
    let synthesizer = GatedSynthesizer {
        fail_on: Some("Thanks for calling!"),
        ..GatedSynthesizer::default()
    };
    let mut harness = Harness::start_with_greeting(
        EchoGenerator::default(),
        synthesizer,
        Some("Thanks for calling!"),
    )
    .await;
    harness.wait_for_phase(SessionLifecyclePhase::Listening).await;

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state, AgentState::Idle);
    assert_eq!(
        snapshot.history,
        vec![DialogueEntry::agent("Thanks for calling!")]
    );
    assert!(snapshot.outbound.is_empty());

    harness.say("hi").await;
    let snapshot = harness
        .wait_for("reply delivery", |s| !s.outbound.is_empty())
        .await;
    assert_eq!(snapshot.outbound, vec![audio("reply to hi")]);
    assert_eq!(
        snapshot.history,
        vec![
            DialogueEntry::agent("Thanks for calling!"),
            DialogueEntry::caller("hi"),
            DialogueEntry::agent("reply to hi"),
        ]
    );
}

#[tokio::test]
async fn dropping_session_handle_invalidates_pending_turn() {
    let reply_gate = Arc::new(Semaphore::new(0));
    let harness = Harness::start(
        EchoGenerator::gated(reply_gate.clone()),
        GatedSynthesizer::default(),
    )
    .await;

    harness.say("question").await;
    harness
        .wait_for("reply request", |s| s.replies_requested == 1)
        .await;

    let Harness {
        session,
        generator,
        synthesizer,
        outbound,
        ..
    } = harness;
    drop(session);

    reply_gate.add_permits(1);
    sleep(SETTLE).await;

    assert_eq!(generator.requests().len(), 1);
    assert!(synthesizer.texts().is_empty());
    assert!(outbound
        .messages
        .lock()
        .expect("outbound lock poisoned")
        .is_empty());
}
