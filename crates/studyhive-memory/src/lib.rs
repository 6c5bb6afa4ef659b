pub mod kv;
pub mod transcript;

pub use kv::{FileKvStore, KeyValueStore, MemoryKvStore};
pub use transcript::{TranscriptStore, CHAT_HISTORY_KEY};
