pub mod config;
pub mod debounce;
pub mod error;
pub mod generation;
pub mod notes;
pub mod orchestrator;
pub mod prompts;
pub mod roadmap;
pub mod roadmap_board;
pub mod sanitize;
pub mod session;
pub mod slash_commands;

pub use config::*;
pub use debounce::*;
pub use error::*;
pub use generation::*;
pub use notes::*;
pub use orchestrator::*;
pub use roadmap::*;
pub use roadmap_board::*;
pub use sanitize::*;
pub use session::*;
pub use slash_commands::*;
