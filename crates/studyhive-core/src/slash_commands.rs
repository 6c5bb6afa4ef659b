//! Slash commands typed at the chat prompt. Anything that is not a known
//! command is treated as a message to send.

/// Parsed slash command from user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// /reset - Clear the conversation, notes and roadmap
    Reset,
    /// /notes - Show the current study notes
    Notes,
    /// /refresh - Recompile notes now
    Refresh,
    /// /roadmap - Show the roadmap; `/roadmap refresh` regenerates it
    Roadmap { refresh: bool },
    /// /concept <name|number> - Drill into a roadmap concept
    Concept(ConceptRef),
    /// /history - Print the transcript
    History,
    /// /help
    Help,
    /// /quit or /exit
    Quit,
}

/// A roadmap concept picked by its 1-based position or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConceptRef {
    Index(usize),
    Name(String),
}

/// Parse a message to check if it starts with a slash command
pub fn parse_command(text: &str) -> Option<SlashCommand> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (trimmed, ""),
    };

    match cmd.to_lowercase().as_str() {
        "/reset" | "/new" => Some(SlashCommand::Reset),
        "/notes" => Some(SlashCommand::Notes),
        "/refresh" => Some(SlashCommand::Refresh),
        "/roadmap" => Some(SlashCommand::Roadmap {
            refresh: rest.eq_ignore_ascii_case("refresh"),
        }),
        "/concept" if !rest.is_empty() => {
            let target = match rest.parse::<usize>() {
                Ok(index) => ConceptRef::Index(index),
                Err(_) => ConceptRef::Name(rest.to_string()),
            };
            Some(SlashCommand::Concept(target))
        }
        "/history" => Some(SlashCommand::History),
        "/help" | "/?" => Some(SlashCommand::Help),
        "/quit" | "/exit" => Some(SlashCommand::Quit),
        _ => None,
    }
}

/// Resolve a concept reference against the roadmap's concept names.
/// Names match case-insensitively; an unknown name is passed through so
/// the learner can still drill into it.
pub fn resolve_concept(target: &ConceptRef, concepts: &[&str]) -> Option<String> {
    match target {
        ConceptRef::Index(index) => index
            .checked_sub(1)
            .and_then(|i| concepts.get(i))
            .map(|name| name.to_string()),
        ConceptRef::Name(name) => Some(
            concepts
                .iter()
                .find(|c| c.eq_ignore_ascii_case(name))
                .map(|c| c.to_string())
                .unwrap_or_else(|| name.clone()),
        ),
    }
}

pub fn help_text() -> &'static str {
    "Commands:\n\
     \x20 /roadmap [refresh]       show (or regenerate) the learning roadmap\n\
     \x20 /concept <name|number>   prepare a question about a roadmap concept\n\
     \x20 /notes                   show the study notes\n\
     \x20 /refresh                 recompile the study notes now\n\
     \x20 /history                 print the conversation\n\
     \x20 /reset                   start over\n\
     \x20 /quit                    leave\n\
     Anything else is sent as a message. An empty line sends the prepared input."
}
