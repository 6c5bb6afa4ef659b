use std::sync::Arc;

use anyhow::Result;
use studyhive_memory::{KeyValueStore, TranscriptStore};
use studyhive_provider::LlmProvider;
use studyhive_schema::{Message, Role};
use tokio::sync::{watch, Mutex};

use super::config::StudyConfig;
use super::error::SubmitError;
use super::generation::GenerationClient;
use super::notes::{NotesCompiler, NotesView};
use super::prompts::{concept_context, concept_input};
use super::roadmap_board::{RoadmapBoard, RoadmapView};

pub const REPLY_FALLBACK: &str =
    "I'm sorry, I couldn't process your request right now. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
}

/// What happened to a submitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was appended and published as the new context.
    Replied { reply: String },
    /// The fallback message was appended; context is unchanged.
    Failed { error: String },
    /// A reset landed while the reply was in flight.
    Discarded,
}

struct ChatState {
    transcript: Vec<Message>,
    input: String,
    context: String,
    phase: Phase,
    /// Bumped on reset so in-flight replies can tell they are stale.
    epoch: u64,
}

/// Owns the conversation: transcript, pending input, published context and
/// the submit/reply cycle. Notes and roadmap follow along through their
/// change hooks.
pub struct ChatOrchestrator {
    state: Mutex<ChatState>,
    transcript_store: TranscriptStore,
    client: Arc<GenerationClient>,
    notes: Arc<NotesCompiler>,
    roadmap: Arc<RoadmapBoard>,
    context_tx: watch::Sender<String>,
}

impl ChatOrchestrator {
    /// Restore the stored transcript and wire up the collaborators.
    pub async fn load(
        transcript_store: TranscriptStore,
        client: Arc<GenerationClient>,
        notes: Arc<NotesCompiler>,
        roadmap: Arc<RoadmapBoard>,
    ) -> Arc<Self> {
        let transcript = transcript_store.load().await;
        tracing::info!(messages = transcript.len(), "transcript restored");
        notes.on_transcript_changed(transcript.clone());

        let context = restored_context(&transcript);
        roadmap.on_context_changed(&context);

        let (context_tx, _) = watch::channel(context.clone());
        Arc::new(Self {
            state: Mutex::new(ChatState {
                transcript,
                input: String::new(),
                context,
                phase: Phase::Idle,
                epoch: 0,
            }),
            transcript_store,
            client,
            notes,
            roadmap,
            context_tx,
        })
    }

    /// Build the full component graph from configuration.
    pub async fn open(
        config: &StudyConfig,
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Arc<Self> {
        let client = Arc::new(GenerationClient::from_config(provider, config));
        let notes = NotesCompiler::new(client.clone(), config.notes.debounce());
        let roadmap = RoadmapBoard::new(client.clone(), config.roadmap.debounce());
        Self::load(TranscriptStore::new(store), client, notes, roadmap).await
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.state.lock().await.input = text.into();
    }

    pub async fn input(&self) -> String {
        self.state.lock().await.input.clone()
    }

    pub async fn transcript(&self) -> Vec<Message> {
        self.state.lock().await.transcript.clone()
    }

    pub async fn context(&self) -> String {
        self.state.lock().await.context.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub fn subscribe_context(&self) -> watch::Receiver<String> {
        self.context_tx.subscribe()
    }

    pub fn notes(&self) -> &Arc<NotesCompiler> {
        &self.notes
    }

    pub fn roadmap(&self) -> &Arc<RoadmapBoard> {
        &self.roadmap
    }

    /// Send the pending input.
    ///
    /// The user message is appended and the input cleared before the
    /// provider is called. Exactly one assistant message follows: the
    /// reply, or the fixed fallback on failure.
    pub async fn submit(&self) -> Result<TurnOutcome, SubmitError> {
        let (prompt, history, epoch) = {
            let mut state = self.state.lock().await;
            if state.phase == Phase::Submitting {
                return Err(SubmitError::InFlight);
            }
            let prompt = state.input.trim().to_string();
            if prompt.is_empty() {
                return Err(SubmitError::EmptyInput);
            }

            let history = state.transcript.clone();
            state.transcript.push(Message::user(prompt.clone()));
            state.input.clear();
            state.phase = Phase::Submitting;
            self.transcript_changed(&state.transcript).await;
            (prompt, history, state.epoch)
        };

        tracing::debug!(chars = prompt.len(), turns = history.len(), "submitting message");
        let result = self.client.reply(&prompt, &history).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            tracing::info!("conversation was reset while awaiting reply, discarding it");
            return Ok(TurnOutcome::Discarded);
        }

        let outcome = match result {
            Ok(reply) => {
                state.transcript.push(Message::assistant(reply.clone()));
                state.context = reply.clone();
                self.context_tx.send_replace(reply.clone());
                self.roadmap.on_context_changed(&reply);
                TurnOutcome::Replied { reply }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reply failed, appending fallback");
                state.transcript.push(Message::assistant(REPLY_FALLBACK));
                TurnOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        state.phase = Phase::Idle;
        self.transcript_changed(&state.transcript).await;
        Ok(outcome)
    }

    /// Pre-fill the input with a drill-down question about `concept` and
    /// publish a context that ties it to the current one. The transcript
    /// is untouched until the input is submitted.
    pub async fn select_concept(&self, concept: &str) -> String {
        let mut state = self.state.lock().await;
        let concept = concept.trim();
        state.input = concept_input(concept);
        state.context = concept_context(concept, &state.context);

        tracing::debug!(concept, "concept selected");
        self.context_tx.send_replace(state.context.clone());
        self.roadmap.on_context_changed(&state.context);
        state.input.clone()
    }

    /// Clear transcript, input, context, notes, roadmap and the chat
    /// session. A reply still in flight is discarded when it lands.
    pub async fn reset(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.epoch += 1;
        state.transcript.clear();
        state.input.clear();
        state.context.clear();
        state.phase = Phase::Idle;

        self.context_tx.send_replace(String::new());
        self.notes.reset();
        self.roadmap.reset();
        self.client.invalidate_session().await;
        self.transcript_store.clear().await?;
        tracing::info!("conversation reset");
        Ok(())
    }

    pub async fn refresh_notes(&self) -> NotesView {
        let transcript = self.transcript().await;
        self.notes.refresh(transcript).await
    }

    pub async fn refresh_roadmap(&self) -> RoadmapView {
        let context = self.context().await;
        self.roadmap.refresh(&context).await
    }

    async fn transcript_changed(&self, transcript: &[Message]) {
        if let Err(e) = self.transcript_store.save(transcript).await {
            tracing::warn!(error = %e, "failed to persist transcript");
        }
        self.notes.on_transcript_changed(transcript.to_vec());
    }
}

/// Context of a restored transcript: the latest assistant reply. Fallback
/// messages never become context.
fn restored_context(transcript: &[Message]) -> String {
    transcript
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant && m.content != REPLY_FALLBACK)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}
