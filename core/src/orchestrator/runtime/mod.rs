mod handle;
mod pipeline;
mod state;
mod worker;

pub use handle::SessionHandle;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, Mutex};

use crate::audio::TranscriptStream;
use crate::orchestrator::config::MediatorConfig;
use crate::orchestrator::prompt::PromptContext;
use crate::orchestrator::traits::{
    OutboundSink, RecognitionService, ReplyGenerator, SpeechSynthesizer,
};
use crate::session::lifecycle::SessionLifecycleUpdate;

use self::pipeline::ResponsePipeline;
use self::state::ConversationState;
use self::worker::SessionWorker;

pub(crate) async fn spawn_session(
    session_id: Arc<str>,
    config: &MediatorConfig,
    prompt: Arc<PromptContext>,
    recognizer: &dyn RecognitionService,
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    outbound: Arc<dyn OutboundSink>,
    lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
) -> Result<SessionHandle> {
    let (transcripts, events_rx) =
        TranscriptStream::open(recognizer, &config.recognition, config.buffer_capacity)
            .await
            .with_context(|| format!("failed to open recognition stream for {session_id}"))?;

    let state = ConversationState::default();
    let closed = state.controller.closed_flag();
    let state = Arc::new(Mutex::new(state));
    let pipeline = Arc::new(ResponsePipeline::new(
        Arc::clone(&session_id),
        prompt,
        generator,
        synthesizer,
        outbound,
        Arc::clone(&state),
    ));

    let worker = SessionWorker::new(
        Arc::clone(&session_id),
        events_rx,
        Arc::clone(&state),
        pipeline,
        config.greeting.clone(),
        lifecycle_tx.clone(),
    )
    .spawn();

    Ok(SessionHandle::new(
        session_id,
        transcripts,
        state,
        closed,
        lifecycle_tx,
        worker,
    ))
}
