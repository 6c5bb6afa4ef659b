use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use studyhive_schema::{Message, NotesDocument};
use tokio::sync::watch;

use crate::debounce::{Debouncer, Ticket};
use crate::error::GenerationError;
use crate::generation::GenerationClient;

pub const NOTES_FAILURE_MESSAGE: &str = "Failed to generate notes. Please try again later.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NotesState {
    #[default]
    Empty,
    Generating,
    Ready(NotesDocument),
    Failed { message: String },
}

impl NotesState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Generating => "generating",
            Self::Ready(_) => "ready",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesView {
    pub state: NotesState,
    /// Transcript length the current notes were compiled from.
    pub last_processed_len: usize,
    /// Transcript length of the scheduled or running compilation.
    pub pending_len: Option<usize>,
}

/// Keeps study notes in step with the transcript.
///
/// Transcript changes are coalesced: a compilation starts only after the
/// quiet period passes without another change, and a superseded
/// compilation never overwrites the state of a newer one.
pub struct NotesCompiler {
    client: Arc<GenerationClient>,
    debounce: Duration,
    debouncer: Debouncer,
    state: watch::Sender<NotesView>,
}

impl NotesCompiler {
    pub fn new(client: Arc<GenerationClient>, debounce: Duration) -> Arc<Self> {
        let (state, _) = watch::channel(NotesView::default());
        Arc::new(Self {
            client,
            debounce,
            debouncer: Debouncer::new(),
            state,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<NotesView> {
        self.state.subscribe()
    }

    pub fn view(&self) -> NotesView {
        self.state.borrow().clone()
    }

    /// Schedule a compilation if the transcript length differs from the
    /// last processed (or already pending) length.
    pub fn on_transcript_changed(self: &Arc<Self>, transcript: Vec<Message>) {
        let len = transcript.len();
        {
            let view = self.state.borrow();
            if len == 0 || len == view.last_processed_len || view.pending_len == Some(len) {
                tracing::trace!(len, "notes up to date, nothing to schedule");
                return;
            }
        }

        let ticket = self.schedule(len);
        tracing::debug!(len, epoch = ticket.epoch(), "notes compilation scheduled");
        let this = Arc::clone(self);
        let delay = self.debounce;
        tokio::spawn(async move { this.run(ticket, transcript, delay).await });
    }

    /// Compile immediately, superseding anything scheduled, and return the
    /// resulting view.
    pub async fn refresh(&self, transcript: Vec<Message>) -> NotesView {
        if transcript.is_empty() {
            return self.view();
        }
        let ticket = self.schedule(transcript.len());
        self.run(ticket, transcript, Duration::ZERO).await;
        self.view()
    }

    /// Cancel pending work and return to the empty state.
    pub fn reset(&self) {
        self.debouncer.cancel();
        self.state.send_replace(NotesView::default());
    }

    fn schedule(&self, len: usize) -> Ticket {
        let ticket = self.debouncer.begin();
        self.state.send_modify(|view| view.pending_len = Some(len));
        ticket
    }

    async fn run(&self, ticket: Ticket, transcript: Vec<Message>, delay: Duration) {
        let token = ticket.token().clone();
        if !delay.is_zero() {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let started = self.state.send_if_modified(|view| {
            if !self.debouncer.is_current(&ticket) {
                return false;
            }
            view.state = NotesState::Generating;
            true
        });
        if !started {
            return;
        }

        let result = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(epoch = ticket.epoch(), "notes compilation superseded");
                return;
            }
            result = self.client.notes(&transcript) => result,
        };
        self.commit(&ticket, transcript.len(), result);
    }

    fn commit(&self, ticket: &Ticket, len: usize, result: Result<String, GenerationError>) {
        let committed = self.state.send_if_modified(|view| {
            if !self.debouncer.is_current(ticket) {
                return false;
            }
            view.pending_len = None;
            match result {
                Ok(markdown) => {
                    view.state = NotesState::Ready(NotesDocument {
                        markdown,
                        generated_at: Utc::now(),
                        source_len: len,
                    });
                    view.last_processed_len = len;
                }
                Err(e) => {
                    tracing::warn!(error = %e, len, "notes compilation failed");
                    view.state = NotesState::Failed {
                        message: NOTES_FAILURE_MESSAGE.to_string(),
                    };
                }
            }
            true
        });
        if !committed {
            tracing::debug!(epoch = ticket.epoch(), "dropping stale notes result");
        }
    }
}
