//! Prompt templates for the three generation operations and the concept
//! drill-down strings.

use studyhive_schema::{Message, Role};

use crate::sanitize::strip_links;

/// `role: content` lines, oldest first.
pub fn history_summary(history: &[Message]) -> String {
    history
        .iter()
        .map(|msg| format!("{}: {}", msg.role, msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn reply_instruction(history: &[Message]) -> String {
    let summary = history_summary(history);
    let summary = if summary.is_empty() {
        "(this is the start of the conversation)".to_string()
    } else {
        summary
    };

    format!(
        r#"You are an intelligent AI learning assistant. Your goal is to help users learn and understand concepts clearly.

Context of conversation:
{summary}

Instructions:
1. Analyze the conversation context thoroughly
2. Ensure your response is directly relevant to the current topic
3. If the user's question seems unclear, ask for clarification
4. Provide concrete examples when explaining concepts
5. Use markdown formatting for better readability
6. Keep explanations concise but comprehensive
7. If discussing code, include practical examples
8. Reference previous parts of the conversation when relevant

Please provide your response in a clear, structured format."#
    )
}

pub fn roadmap_prompt(source_text: &str) -> String {
    format!(
        r#"Based on the following topic, create a detailed learning roadmap.

Current Focus Topic:
{source_text}

Instructions:
1. Understand what the learner is trying to achieve
2. Create a progressive learning path that builds upon the topic
3. Include practical resources and examples
4. Ensure each step is actionable and measurable

Generate a structured learning roadmap as a JSON array with the following format:
[
  {{
    "title": "Step Title (make it descriptive and action-oriented)",
    "descriptions": [
      {{
        "concept": "Specific Topic or Skill",
        "description": "Clear, practical explanation with concrete steps",
        "link": "Relevant learning resource URL",
        "prerequisite": "Any prerequisite knowledge needed",
        "estimatedTime": "Estimated time to complete this step"
      }}
    ]
  }}
]

Respond with the JSON array only. Include 3-5 main sections, each building upon the previous one."#
    )
}

/// Trailing `window` messages of `history`.
pub fn notes_window(history: &[Message], window: usize) -> &[Message] {
    let start = history.len().saturating_sub(window);
    &history[start..]
}

pub fn notes_prompt(window: &[Message]) -> String {
    let mut questions = Vec::new();
    let mut explanations = Vec::new();
    for msg in window {
        let content = strip_links(&msg.content);
        match msg.role {
            Role::User => questions.push(format!("- {}", content.trim())),
            Role::Assistant => explanations.push(content.trim().to_string()),
        }
    }

    let questions = if questions.is_empty() {
        "(none)".to_string()
    } else {
        questions.join("\n")
    };
    let explanations = if explanations.is_empty() {
        "(none)".to_string()
    } else {
        explanations.join("\n\n")
    };

    format!(
        r#"Turn the following learning conversation into well-organized study notes.

Questions:
{questions}

Explanations:
{explanations}

Format the notes in markdown:
# A short title for the topic
## Overview
A two or three sentence summary.
## Key Concepts
- One bullet per concept with a concise definition
## Examples
- Concrete examples taken from the explanations
## Review Questions
- Three questions the learner should be able to answer

Do not include links or URLs."#
    )
}

/// Input pre-filled when the learner picks a roadmap concept.
pub fn concept_input(concept: &str) -> String {
    format!("Tell me more about {concept} with examples.")
}

/// Context published when the learner picks a roadmap concept.
pub fn concept_context(concept: &str, last_context: &str) -> String {
    if last_context.trim().is_empty() {
        return format!("Explain {concept} in detail and provide specific examples.");
    }
    format!(
        "Based on our discussion about {last_context}, explain {concept} in detail, showing its relevance to {last_context} and provide specific examples."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_summary_lines() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        assert_eq!(history_summary(&history), "user: hi\nassistant: hello");
    }

    #[test]
    fn reply_instruction_embeds_history() {
        let history = vec![Message::user("What is recursion?")];
        let prompt = reply_instruction(&history);
        assert!(prompt.contains("user: What is recursion?"));
        assert!(prompt.contains("Use markdown formatting"));

        let fresh = reply_instruction(&[]);
        assert!(fresh.contains("start of the conversation"));
    }

    #[test]
    fn roadmap_prompt_contains_topic_and_schema() {
        let prompt = roadmap_prompt("binary trees");
        assert!(prompt.contains("binary trees"));
        assert!(prompt.contains("\"estimatedTime\""));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn notes_window_takes_suffix() {
        let history: Vec<Message> = (0..12).map(|i| Message::user(format!("m{i}"))).collect();
        let window = notes_window(&history, 10);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "m2");
        assert_eq!(notes_window(&history[..3], 10).len(), 3);
    }

    #[test]
    fn notes_prompt_groups_and_sanitizes() {
        let window = vec![
            Message::user("See [docs](http://x.com/y) or http://z.com"),
            Message::assistant("Recursion is self reference, see https://en.wikipedia.org"),
            Message::user("Example?"),
        ];
        let sanitized = strip_links(&window[0].content);
        assert_eq!(sanitized, "See docs or ");
        let prompt = notes_prompt(&window);

        let questions = prompt.split("Questions:").nth(1).unwrap();
        let (questions, explanations) = questions.split_once("Explanations:").unwrap();
        assert!(questions.contains(&format!("- {}\n", sanitized.trim())));
        assert!(questions.contains("- Example?"));
        assert!(explanations.contains("Recursion is self reference, see"));
        assert!(!prompt.contains("x.com"));
        assert!(!prompt.contains("wikipedia"));
    }

    #[test]
    fn concept_strings_reference_concept_and_context() {
        assert_eq!(
            concept_input("tail calls"),
            "Tell me more about tail calls with examples."
        );
        let ctx = concept_context("tail calls", "recursion");
        assert!(ctx.contains("explain tail calls"));
        assert!(ctx.contains("about recursion"));
        assert!(concept_context("tail calls", "").contains("tail calls"));
    }
}
