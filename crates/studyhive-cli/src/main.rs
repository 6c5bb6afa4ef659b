use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use studyhive_core::*;
use studyhive_memory::{FileKvStore, KeyValueStore, TranscriptStore};
use studyhive_provider::create_provider;
use studyhive_schema::{Description, DescriptionItem, Message, RoadmapStep};

#[derive(Parser)]
#[command(name = "studyhive", version, about = "studyhive AI learning assistant")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.studyhive",
        help = "Config root directory (contains studyhive.yaml, data/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    #[command(about = "Interactive learning session")]
    Chat,
    #[command(about = "Validate studyhive.yaml")]
    Validate,
    #[command(about = "Compile study notes from the saved conversation")]
    Notes,
    #[command(about = "Generate a learning roadmap for a topic")]
    Roadmap {
        #[arg(required = true, help = "Topic to build the roadmap for")]
        topic: Vec<String>,
    },
    #[command(about = "Delete the saved conversation")]
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.config_root = expand_home(&cli.config_root);

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "studyhive.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let root = cli.config_root;
    match command {
        Commands::Validate => {
            let config = load_config(&root)?;
            println!(
                "Config valid. provider: {:?}, model: {}, data dir: {}",
                config.provider.kind,
                config.provider.model,
                config.data_dir(&root).display()
            );
        }
        Commands::Chat => run_repl(&root).await?,
        Commands::Notes => {
            let config = load_config(&root)?;
            let client = GenerationClient::from_config(create_provider(&config.provider)?, &config);
            let transcript = TranscriptStore::new(open_store(&config, &root)).load().await;
            if transcript.is_empty() {
                println!("No conversation saved yet.");
                return Ok(());
            }
            match client.notes(&transcript).await {
                Ok(markdown) => println!("{markdown}"),
                Err(e) => {
                    eprintln!("{NOTES_FAILURE_MESSAGE}");
                    return Err(e.into());
                }
            }
        }
        Commands::Roadmap { topic } => {
            let config = load_config(&root)?;
            let client = GenerationClient::from_config(create_provider(&config.provider)?, &config);
            let steps = client.roadmap(&topic.join(" ")).await;
            print!("{}", render_roadmap(&steps));
        }
        Commands::Reset => {
            let config = load_config(&root)?;
            let removed = TranscriptStore::new(open_store(&config, &root))
                .clear()
                .await?;
            if removed {
                println!("Saved conversation deleted.");
            } else {
                println!("No saved conversation.");
            }
        }
    }

    Ok(())
}

fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

fn open_store(config: &StudyConfig, root: &Path) -> Arc<dyn KeyValueStore> {
    Arc::new(FileKvStore::new(config.data_dir(root)))
}

async fn run_repl(root: &Path) -> Result<()> {
    let config = load_config(root)?;
    let provider = create_provider(&config.provider)?;
    let orch = ChatOrchestrator::open(&config, provider, open_store(&config, root)).await;
    tracing::info!(root = %root.display(), model = %config.provider.model, "chat session started");
    spawn_status_watchers(&orch);

    println!("studyhive chat. Type /help for commands, /quit to exit.");
    let restored = orch.transcript().await.len();
    if restored > 0 {
        println!("Restored {restored} messages. /history shows them.");
    }
    println!("---");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if let Some(command) = parse_command(line) {
            if !handle_command(&orch, command).await? {
                break;
            }
            continue;
        }

        if line.is_empty() {
            // An empty line sends input prepared by /concept, if any.
            if orch.input().await.is_empty() {
                continue;
            }
        } else {
            orch.set_input(line).await;
        }

        match orch.submit().await {
            Ok(TurnOutcome::Replied { reply }) => println!("\n{reply}\n"),
            Ok(TurnOutcome::Failed { .. }) => println!("\n{REPLY_FALLBACK}\n"),
            Ok(TurnOutcome::Discarded) | Err(SubmitError::EmptyInput) => {}
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    Ok(())
}

/// Returns false when the REPL should exit.
async fn handle_command(orch: &ChatOrchestrator, command: SlashCommand) -> Result<bool> {
    match command {
        SlashCommand::Quit => return Ok(false),
        SlashCommand::Help => println!("{}", help_text()),
        SlashCommand::Reset => {
            orch.reset().await?;
            println!("Conversation cleared.");
        }
        SlashCommand::Notes => print!("{}", render_notes(&orch.notes().view())),
        SlashCommand::Refresh => {
            println!("Compiling notes...");
            print!("{}", render_notes(&orch.refresh_notes().await));
        }
        SlashCommand::Roadmap { refresh } => {
            let view = if refresh {
                println!("Regenerating roadmap...");
                orch.refresh_roadmap().await
            } else {
                orch.roadmap().view()
            };
            print!("{}", render_roadmap(&view.steps));
            if view.loading {
                println!("(an updated roadmap is on its way)");
            }
        }
        SlashCommand::Concept(target) => {
            let view = orch.roadmap().view();
            match resolve_concept(&target, &view.concepts()) {
                Some(concept) => {
                    let input = orch.select_concept(&concept).await;
                    println!("Prepared: {input}");
                    println!("Press Enter to send it, or type a different message.");
                }
                None => println!("No such concept. /roadmap lists the numbered concepts."),
            }
        }
        SlashCommand::History => print!("{}", render_history(&orch.transcript().await)),
    }
    Ok(true)
}

/// Announce roadmap and notes updates as they land in the background.
fn spawn_status_watchers(orch: &Arc<ChatOrchestrator>) {
    let mut roadmap_rx = orch.roadmap().subscribe();
    tokio::spawn(async move {
        while roadmap_rx.changed().await.is_ok() {
            let count = {
                let view = roadmap_rx.borrow_and_update();
                if view.loading {
                    continue;
                }
                view.concepts().len()
            };
            if count > 0 {
                println!("\n[roadmap updated: {count} concepts, /roadmap to view]");
            }
        }
    });

    let mut notes_rx = orch.notes().subscribe();
    tokio::spawn(async move {
        let mut announced = None;
        while notes_rx.changed().await.is_ok() {
            let message = {
                let view = notes_rx.borrow_and_update();
                match &view.state {
                    NotesState::Ready(doc) if announced != Some(doc.generated_at) => {
                        announced = Some(doc.generated_at);
                        Some("[notes updated, /notes to view]".to_string())
                    }
                    NotesState::Failed { message } if view.pending_len.is_none() => {
                        announced = None;
                        Some(format!("[{message}]"))
                    }
                    _ => None,
                }
            };
            if let Some(message) = message {
                println!("\n{message}");
            }
        }
    });
}

fn render_notes(view: &NotesView) -> String {
    match &view.state {
        NotesState::Empty => {
            "No notes yet. They are compiled shortly after the conversation changes.\n".into()
        }
        NotesState::Generating => "Notes are being compiled...\n".into(),
        NotesState::Ready(doc) => format!(
            "{}\n\n(compiled from {} messages at {})\n",
            doc.markdown.trim_end(),
            doc.source_len,
            doc.generated_at.format("%H:%M:%S UTC")
        ),
        NotesState::Failed { message } => format!("{message}\n"),
    }
}

fn render_roadmap(steps: &[RoadmapStep]) -> String {
    if steps.is_empty() {
        return "No roadmap yet.\n".into();
    }

    let mut out = String::new();
    let mut number = 0;
    for (i, step) in steps.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, step.title);
        match &step.descriptions {
            Description::Text(text) => {
                let _ = writeln!(out, "   {text}");
            }
            Description::Items(items) => {
                for item in items {
                    match item {
                        DescriptionItem::Concept(detail) if !detail.concept.trim().is_empty() => {
                            number += 1;
                            let _ = writeln!(out, "   [{number}] {}", detail.concept);
                            for (label, value) in [
                                ("", &detail.description),
                                ("prerequisite: ", &detail.prerequisite),
                                ("time: ", &detail.estimated_time),
                                ("link: ", &detail.link),
                            ] {
                                if !value.trim().is_empty() {
                                    let _ = writeln!(out, "       {label}{value}");
                                }
                            }
                        }
                        DescriptionItem::Concept(detail) => {
                            let _ = writeln!(out, "   - {}", detail.description);
                        }
                        DescriptionItem::Resource(resource) => {
                            let _ = writeln!(out, "   * {} {}", resource.resource, resource.link);
                        }
                    }
                }
            }
        }
    }
    out
}

fn render_history(transcript: &[Message]) -> String {
    if transcript.is_empty() {
        return "No messages yet.\n".into();
    }
    transcript
        .iter()
        .map(|msg| format!("{}: {}\n", msg.role, msg.content))
        .collect()
}
