use chrono::{DateTime, Utc};
use studyhive_provider::LlmMessage;
use studyhive_schema::{Message, Role};
use uuid::Uuid;

/// Conversation state replayed to the provider on every reply. Owned by
/// the generation client; created lazily and dropped on failure or reset.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    history: Vec<LlmMessage>,
    /// Number of transcript messages mirrored in `history`.
    transcript_len: usize,
}

impl ChatSession {
    /// Start a session seeded with an existing transcript.
    pub fn from_transcript(transcript: &[Message]) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: now,
            history: transcript.iter().map(to_llm_message).collect(),
            transcript_len: transcript.len(),
        }
    }

    pub fn history(&self) -> &[LlmMessage] {
        &self.history
    }

    /// Whether this session still mirrors `transcript`. A session that
    /// drifted (for example after an out-of-band transcript edit) must be
    /// rebuilt before reuse.
    pub fn is_aligned_with(&self, transcript: &[Message]) -> bool {
        if self.transcript_len != transcript.len() {
            return false;
        }
        match (self.history.last(), transcript.last()) {
            (Some(ours), Some(theirs)) => ours.text == theirs.content,
            (None, None) => true,
            _ => false,
        }
    }

    pub fn record_turn(&mut self, user: &str, reply: &str) {
        self.history.push(LlmMessage::user(user));
        self.history.push(LlmMessage::model(reply));
        self.transcript_len += 2;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

fn to_llm_message(msg: &Message) -> LlmMessage {
    match msg.role {
        Role::User => LlmMessage::user(msg.content.clone()),
        Role::Assistant => LlmMessage::model(msg.content.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyhive_provider::LlmRole;

    #[test]
    fn seeds_history_from_transcript() {
        let transcript = vec![Message::user("hi"), Message::assistant("hello")];
        let session = ChatSession::from_transcript(&transcript);

        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].role, LlmRole::User);
        assert_eq!(session.history()[1].role, LlmRole::Model);
        assert!(session.is_aligned_with(&transcript));
    }

    #[test]
    fn record_turn_keeps_alignment() {
        let mut transcript = vec![Message::user("q1"), Message::assistant("a1")];
        let mut session = ChatSession::from_transcript(&transcript);
        let before = session.last_active;

        session.record_turn("q2", "a2");
        transcript.push(Message::user("q2"));
        transcript.push(Message::assistant("a2"));

        assert!(session.is_aligned_with(&transcript));
        assert!(session.last_active >= before);
    }

    #[test]
    fn detects_drift() {
        let transcript = vec![Message::user("q1"), Message::assistant("a1")];
        let session = ChatSession::from_transcript(&transcript);

        assert!(!session.is_aligned_with(&[]));
        assert!(!session.is_aligned_with(&[Message::user("q1"), Message::assistant("other")]));
        assert!(ChatSession::from_transcript(&[]).is_aligned_with(&[]));
    }
}
