use std::sync::Arc;
use std::time::Duration;

use studyhive_schema::{concept_names, RoadmapStep};
use tokio::sync::watch;

use crate::debounce::{Debouncer, Ticket};
use crate::generation::GenerationClient;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoadmapView {
    pub steps: Vec<RoadmapStep>,
    /// Context the current steps were generated from.
    pub source: String,
    pub loading: bool,
}

impl RoadmapView {
    pub fn concepts(&self) -> Vec<&str> {
        concept_names(&self.steps)
    }
}

/// Regenerates the roadmap whenever the published context changes.
pub struct RoadmapBoard {
    client: Arc<GenerationClient>,
    debounce: Duration,
    debouncer: Debouncer,
    state: watch::Sender<RoadmapView>,
}

impl RoadmapBoard {
    pub fn new(client: Arc<GenerationClient>, debounce: Duration) -> Arc<Self> {
        let (state, _) = watch::channel(RoadmapView::default());
        Arc::new(Self {
            client,
            debounce,
            debouncer: Debouncer::new(),
            state,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<RoadmapView> {
        self.state.subscribe()
    }

    pub fn view(&self) -> RoadmapView {
        self.state.borrow().clone()
    }

    pub fn on_context_changed(self: &Arc<Self>, context: &str) {
        if context.trim().is_empty() {
            return;
        }
        {
            let view = self.state.borrow();
            if !view.loading && view.source == context {
                return;
            }
        }

        let ticket = self.debouncer.begin();
        self.state.send_modify(|view| view.loading = true);
        let this = Arc::clone(self);
        let context = context.to_string();
        let delay = self.debounce;
        tokio::spawn(async move { this.run(ticket, context, delay).await });
    }

    /// Regenerate from `context` right away. Returns the resulting view.
    pub async fn refresh(&self, context: &str) -> RoadmapView {
        if context.trim().is_empty() {
            return self.view();
        }
        let ticket = self.debouncer.begin();
        self.state.send_modify(|view| view.loading = true);
        self.run(ticket, context.to_string(), Duration::ZERO).await;
        self.view()
    }

    pub fn reset(&self) {
        self.debouncer.cancel();
        self.state.send_replace(RoadmapView::default());
    }

    async fn run(&self, ticket: Ticket, context: String, delay: Duration) {
        let token = ticket.token().clone();
        let steps = tokio::select! {
            _ = token.cancelled() => return,
            steps = async {
                tokio::time::sleep(delay).await;
                self.client.roadmap(&context).await
            } => steps,
        };

        let committed = self.state.send_if_modified(|view| {
            if !self.debouncer.is_current(&ticket) {
                return false;
            }
            tracing::info!(steps = steps.len(), "roadmap updated");
            view.steps = steps;
            view.source = context;
            view.loading = false;
            true
        });
        if !committed {
            tracing::debug!(epoch = ticket.epoch(), "dropping stale roadmap");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationSettings;
    use async_trait::async_trait;
    use studyhive_provider::{LlmProvider, LlmRequest, LlmResponse};

    /// Answers with a one-step roadmap titled after the focus topic line.
    struct TopicProvider {
        prompts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for TopicProvider {
        async fn chat(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
            let prompt = request.last_user_text().to_string();
            let topic = prompt
                .split("Current Focus Topic:\n")
                .nth(1)
                .and_then(|rest| rest.lines().next())
                .unwrap_or_default()
                .to_string();
            self.prompts.lock().unwrap().push(topic.clone());
            Ok(LlmResponse {
                text: serde_json::json!([{
                    "title": topic,
                    "descriptions": [{"concept": format!("{topic} basics")}]
                }])
                .to_string(),
                input_tokens: None,
                output_tokens: None,
                stop_reason: None,
            })
        }
    }

    fn board() -> (Arc<RoadmapBoard>, Arc<TopicProvider>) {
        let provider = Arc::new(TopicProvider {
            prompts: std::sync::Mutex::new(Vec::new()),
        });
        let client = Arc::new(GenerationClient::new(
            provider.clone(),
            "m",
            GenerationSettings::default(),
            10,
        ));
        (RoadmapBoard::new(client, Duration::from_millis(500)), provider)
    }

    #[tokio::test(start_paused = true)]
    async fn latest_context_wins() {
        let (board, provider) = board();
        let mut rx = board.subscribe();

        board.on_context_changed("recursion");
        tokio::time::sleep(Duration::from_millis(100)).await;
        board.on_context_changed("iteration");

        let view = rx.wait_for(|v| !v.loading).await.unwrap().clone();
        assert_eq!(view.source, "iteration");
        assert_eq!(view.concepts(), vec!["iteration basics"]);
        assert_eq!(*provider.prompts.lock().unwrap(), vec!["iteration".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_and_repeated_context_are_ignored() {
        let (board, provider) = board();
        let mut rx = board.subscribe();

        board.on_context_changed("   ");
        assert!(!board.view().loading);

        board.on_context_changed("graphs");
        rx.wait_for(|v| !v.loading && !v.steps.is_empty())
            .await
            .unwrap();
        board.on_context_changed("graphs");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_and_cancels() {
        let (board, provider) = board();
        board.on_context_changed("sorting");
        board.reset();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(board.view(), RoadmapView::default());
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_regenerates_immediately() {
        let (board, provider) = board();
        let view = board.refresh("hashing").await;
        assert_eq!(view.steps[0].title, "hashing");
        board.refresh("hashing").await;
        assert_eq!(provider.prompts.lock().unwrap().len(), 2);
    }
}
