use std::sync::Arc;

use studyhive_provider::{GenerationConfig, LlmMessage, LlmProvider, LlmRequest};
use studyhive_schema::{Message, RoadmapStep};
use tokio::sync::Mutex;

use crate::config::{GenerationSettings, StudyConfig};
use crate::error::GenerationError;
use crate::prompts;
use crate::roadmap::parse_roadmap;
use crate::session::ChatSession;

/// Front door to the text-generation provider for replies, roadmaps and
/// notes.
pub struct GenerationClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    settings: GenerationSettings,
    notes_window: usize,
    session: Mutex<Option<ChatSession>>,
}

impl GenerationClient {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        settings: GenerationSettings,
        notes_window: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            settings,
            notes_window: notes_window.max(1),
            session: Mutex::new(None),
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &StudyConfig) -> Self {
        Self::new(
            provider,
            config.provider.model.clone(),
            config.generation.clone(),
            config.notes.window,
        )
    }

    /// Answer `user_message` given the transcript that precedes it.
    ///
    /// The reply travels inside the client's chat session. Any failure
    /// drops the session so the next call starts from the transcript.
    pub async fn reply(
        &self,
        user_message: &str,
        history: &[Message],
    ) -> Result<String, GenerationError> {
        let mut session = self.checkout_session(history).await;

        let mut messages = session.history().to_vec();
        messages.push(LlmMessage::user(user_message));
        let request = LlmRequest {
            model: self.model.clone(),
            system: Some(prompts::reply_instruction(history)),
            messages,
            generation: self.settings.reply,
        };

        // Checked out while in flight; a failed call never returns it.
        let text = match self.provider.chat(request).await {
            Ok(resp) => resp.text,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "reply failed, dropping chat session");
                return Err(GenerationError::Provider(e));
            }
        };
        if text.trim().is_empty() {
            tracing::warn!(session_id = %session.id, "reply was empty, dropping chat session");
            return Err(GenerationError::EmptyResponse { operation: "reply" });
        }

        session.record_turn(user_message, &text);
        *self.session.lock().await = Some(session);
        Ok(text)
    }

    async fn checkout_session(&self, history: &[Message]) -> ChatSession {
        match self.session.lock().await.take() {
            Some(session) if session.is_aligned_with(history) => session,
            stale => {
                if let Some(stale) = stale {
                    tracing::debug!(session_id = %stale.id, "chat session out of sync, recreating");
                }
                let session = ChatSession::from_transcript(history);
                tracing::debug!(session_id = %session.id, turns = history.len(), "created chat session");
                session
            }
        }
    }

    /// Generate a roadmap for `source_text`. Provider and parse failures
    /// both produce an empty roadmap.
    pub async fn roadmap(&self, source_text: &str) -> Vec<RoadmapStep> {
        let request = self.stateless(
            prompts::roadmap_prompt(source_text),
            self.settings.roadmap,
        );
        match self.provider.chat(request).await {
            Ok(resp) => {
                let steps = parse_roadmap(&resp.text);
                tracing::debug!(steps = steps.len(), "roadmap generated");
                steps
            }
            Err(e) => {
                tracing::warn!(error = %e, "roadmap generation failed");
                Vec::new()
            }
        }
    }

    /// Compile study notes from the trailing window of `history`.
    pub async fn notes(&self, history: &[Message]) -> Result<String, GenerationError> {
        let window = prompts::notes_window(history, self.notes_window);
        let request = self.stateless(prompts::notes_prompt(window), self.settings.notes);
        let resp = self.provider.chat(request).await?;
        if resp.text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse { operation: "notes" });
        }
        Ok(resp.text)
    }

    /// Drop the chat session; the next reply rebuilds it from the transcript.
    pub async fn invalidate_session(&self) {
        if let Some(session) = self.session.lock().await.take() {
            tracing::debug!(session_id = %session.id, "chat session invalidated");
        }
    }

    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    fn stateless(&self, prompt: String, generation: GenerationConfig) -> LlmRequest {
        LlmRequest {
            model: self.model.clone(),
            system: None,
            messages: vec![LlmMessage::user(prompt)],
            generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use studyhive_provider::LlmResponse;

    /// Replays canned results and records every request it sees.
    struct ScriptedProvider {
        script: std::sync::Mutex<VecDeque<anyhow::Result<String>>>,
        seen: std::sync::Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<anyhow::Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                script: std::sync::Mutex::new(script.into()),
                seen: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<LlmRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.seen.lock().unwrap().push(request);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")));
            next.map(|text| LlmResponse {
                text,
                input_tokens: None,
                output_tokens: None,
                stop_reason: Some("end_turn".into()),
            })
        }
    }

    fn client(provider: Arc<ScriptedProvider>) -> GenerationClient {
        GenerationClient::new(provider, "test-model", GenerationSettings::default(), 10)
    }

    #[tokio::test]
    async fn reply_sends_instruction_and_history() {
        let provider = ScriptedProvider::new(vec![Ok("Recursion is...".into())]);
        let client = client(provider.clone());
        let history = vec![Message::user("hi"), Message::assistant("hello")];

        let text = client.reply("What is recursion?", &history).await.unwrap();
        assert_eq!(text, "Recursion is...");

        let requests = provider.requests();
        let req = &requests[0];
        assert_eq!(req.model, "test-model");
        assert!(req.system.as_deref().unwrap().contains("user: hi"));
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.last_user_text(), "What is recursion?");
        assert_eq!(req.generation.max_output_tokens, 1000);
        assert!(client.has_session().await);
    }

    #[tokio::test]
    async fn failure_invalidates_session_and_next_call_replays_transcript() {
        let provider = ScriptedProvider::new(vec![
            Ok("a1".into()),
            Err(anyhow!("boom")),
            Ok("a2".into()),
        ]);
        let client = client(provider.clone());

        client.reply("q1", &[]).await.unwrap();
        assert!(client.has_session().await);

        let history = vec![Message::user("q1"), Message::assistant("a1")];
        let err = client.reply("q2", &history).await.unwrap_err();
        assert!(matches!(err, GenerationError::Provider(_)));
        assert!(!client.has_session().await);

        let history = vec![
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
            Message::assistant("fallback"),
        ];
        client.reply("q3", &history).await.unwrap();
        let last = provider.requests().pop().unwrap();
        let texts: Vec<&str> = last.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["q1", "a1", "q2", "fallback", "q3"]);
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let provider = ScriptedProvider::new(vec![Ok("   ".into())]);
        let client = client(provider);
        let err = client.reply("q", &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse { operation: "reply" }));
        assert!(!client.has_session().await);
    }

    #[tokio::test]
    async fn roadmap_swallows_failures() {
        let provider = ScriptedProvider::new(vec![
            Err(anyhow!("down")),
            Ok("not json at all".into()),
            Ok(r#"[{"title":"Start","descriptions":[{"concept":"Base case"}]}]"#.into()),
        ]);
        let client = client(provider.clone());

        assert!(client.roadmap("recursion").await.is_empty());
        assert!(client.roadmap("recursion").await.is_empty());
        let steps = client.roadmap("recursion").await;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].title, "Start");

        let requests = provider.requests();
        let req = &requests[0];
        assert!(req.system.is_none());
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.generation.max_output_tokens, 2048);
    }

    #[tokio::test]
    async fn notes_uses_bounded_window_and_rejects_empty() {
        let provider = ScriptedProvider::new(vec![Ok("# Notes".into()), Ok(String::new())]);
        let client = GenerationClient::new(
            provider.clone(),
            "test-model",
            GenerationSettings::default(),
            2,
        );
        let history = vec![
            Message::user("oldest question"),
            Message::assistant("old answer"),
            Message::user("see [docs](http://x.com/y)"),
            Message::assistant("newest answer"),
        ];

        assert_eq!(client.notes(&history).await.unwrap(), "# Notes");
        let prompt = provider.requests()[0].last_user_text().to_string();
        assert!(!prompt.contains("oldest question"));
        assert!(prompt.contains("- see docs"));
        assert!(prompt.contains("newest answer"));

        let err = client.notes(&history).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse { operation: "notes" }));
    }

    #[tokio::test]
    async fn invalidate_session_forces_rebuild() {
        let provider = ScriptedProvider::new(vec![Ok("a1".into())]);
        let client = client(provider);
        client.reply("q1", &[]).await.unwrap();
        client.invalidate_session().await;
        assert!(!client.has_session().await);
    }
}
