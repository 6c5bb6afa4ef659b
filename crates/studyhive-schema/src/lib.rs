use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript entry. Consecutive entries may share a role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// A concept to study inside a roadmap step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDetail {
    pub concept: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub prerequisite: String,
    #[serde(default)]
    pub estimated_time: String,
}

/// An external learning resource inside a roadmap step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceLink {
    pub resource: String,
    #[serde(default)]
    pub link: String,
}

/// One entry of a step's description list, decided once from the shape of
/// the decoded object: a `concept` key wins over a `resource` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DescriptionItem {
    Concept(ConceptDetail),
    Resource(ResourceLink),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    Items(Vec<DescriptionItem>),
}

impl Default for Description {
    fn default() -> Self {
        Self::Items(Vec::new())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoadmapStep {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub descriptions: Description,
}

impl RoadmapStep {
    pub fn concepts(&self) -> impl Iterator<Item = &ConceptDetail> {
        let items: &[DescriptionItem] = match &self.descriptions {
            Description::Items(items) => items,
            Description::Text(_) => &[],
        };
        items.iter().filter_map(|item| match item {
            DescriptionItem::Concept(detail) => Some(detail),
            DescriptionItem::Resource(_) => None,
        })
    }
}

/// Concept names of a roadmap in display order, skipping blanks.
pub fn concept_names(steps: &[RoadmapStep]) -> Vec<&str> {
    steps
        .iter()
        .flat_map(|step| step.concepts())
        .map(|detail| detail.concept.as_str())
        .filter(|name| !name.trim().is_empty())
        .collect()
}

/// Study notes compiled from a window of the transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotesDocument {
    pub markdown: String,
    pub generated_at: DateTime<Utc>,
    /// Transcript length the notes were compiled from.
    pub source_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serde_matches_stored_shape() {
        let msg = Message::user("What is recursion?");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "What is recursion?");

        let parsed: Message =
            serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(parsed, Message::assistant("hi"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let parsed = serde_json::from_str::<Message>(r#"{"role":"system","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn concept_detail_uses_camel_case_estimated_time() {
        let detail = ConceptDetail {
            concept: "Closures".into(),
            estimated_time: "2h".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["estimatedTime"], "2h");
    }

    #[test]
    fn description_item_untagged_prefers_concept() {
        let item: DescriptionItem = serde_json::from_str(
            r#"{"concept":"X","resource":"book","link":"http://a"}"#,
        )
        .unwrap();
        assert!(matches!(item, DescriptionItem::Concept(ref c) if c.concept == "X"));

        let item: DescriptionItem =
            serde_json::from_str(r#"{"resource":"book","link":"http://a"}"#).unwrap();
        assert!(matches!(item, DescriptionItem::Resource(ref r) if r.resource == "book"));
    }

    #[test]
    fn concept_names_skip_resources_and_text() {
        let steps = vec![
            RoadmapStep {
                title: "Basics".into(),
                descriptions: Description::Items(vec![
                    DescriptionItem::Concept(ConceptDetail {
                        concept: "Base case".into(),
                        ..Default::default()
                    }),
                    DescriptionItem::Resource(ResourceLink {
                        resource: "SICP".into(),
                        link: "https://example.com".into(),
                    }),
                    DescriptionItem::Concept(ConceptDetail::default()),
                ]),
            },
            RoadmapStep {
                title: "Practice".into(),
                descriptions: Description::Text("write code".into()),
            },
        ];
        assert_eq!(concept_names(&steps), vec!["Base case"]);
    }
}
