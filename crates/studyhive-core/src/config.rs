use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use studyhive_provider::{GenerationConfig, ProviderConfig, ProviderKind};

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "studyhive.yaml";

fn default_provider() -> ProviderConfig {
    ProviderConfig::new(ProviderKind::Gemini).with_api_key("${GEMINI_API_KEY}")
}

fn default_long_form() -> GenerationConfig {
    GenerationConfig::default().with_max_output_tokens(2048)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default)]
    pub reply: GenerationConfig,
    #[serde(default = "default_long_form")]
    pub roadmap: GenerationConfig,
    #[serde(default = "default_long_form")]
    pub notes: GenerationConfig,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            reply: GenerationConfig::default(),
            roadmap: default_long_form(),
            notes: default_long_form(),
        }
    }
}

fn default_notes_debounce_ms() -> u64 {
    1000
}

fn default_notes_window() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesSettings {
    /// Quiet period after the last transcript change
    #[serde(default = "default_notes_debounce_ms")]
    pub debounce_ms: u64,
    /// Number of trailing messages compiled into notes
    #[serde(default = "default_notes_window")]
    pub window: usize,
}

impl Default for NotesSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_notes_debounce_ms(),
            window: default_notes_window(),
        }
    }
}

impl NotesSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_roadmap_debounce_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapSettings {
    #[serde(default = "default_roadmap_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for RoadmapSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_roadmap_debounce_ms(),
        }
    }
}

impl RoadmapSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Defaults to `<config_root>/data`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub notes: NotesSettings,
    #[serde(default)]
    pub roadmap: RoadmapSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            generation: GenerationSettings::default(),
            notes: NotesSettings::default(),
            roadmap: RoadmapSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl StudyConfig {
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        match &self.storage.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => root.join("data"),
        }
    }
}

/// Expand `${VAR}` references from the environment. Unset variables
/// expand to the empty string.
pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

fn resolve_provider_env(provider: &mut ProviderConfig) {
    provider.api_key = provider.api_key.as_deref().map(resolve_env_var);
    provider.base_url = provider.base_url.as_deref().map(resolve_env_var);
    provider.model = resolve_env_var(&provider.model);
}

/// Load `<root>/studyhive.yaml`, falling back to defaults when the file
/// does not exist.
pub fn load_config(root: &Path) -> Result<StudyConfig, ConfigError> {
    let path = root.join(CONFIG_FILE_NAME);
    let mut config = match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            StudyConfig::default()
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    resolve_provider_env(&mut config.provider);
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<StudyConfig, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(StudyConfig::default());
    }
    serde_yaml::from_str(content)
}

pub fn validate_config(config: &StudyConfig) -> Result<(), ConfigError> {
    if config.provider.kind == ProviderKind::Gemini && config.provider.api_key().is_none() {
        return Err(ConfigError::MissingCredential { provider: "gemini" });
    }

    if config.provider.model.trim().is_empty() {
        return Err(ConfigError::Invalid("provider.model must not be empty".into()));
    }

    if config.notes.window == 0 {
        return Err(ConfigError::Invalid("notes.window must be at least 1".into()));
    }

    for (name, generation) in [
        ("reply", &config.generation.reply),
        ("roadmap", &config.generation.roadmap),
        ("notes", &config.generation.notes),
    ] {
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ConfigError::Invalid(format!(
                "generation.{name}.temperature must be within 0..=2"
            )));
        }
        if !(0.0..=1.0).contains(&generation.top_p) {
            return Err(ConfigError::Invalid(format!(
                "generation.{name}.top_p must be within 0..=1"
            )));
        }
        if generation.max_output_tokens == 0 {
            return Err(ConfigError::Invalid(format!(
                "generation.{name}.max_output_tokens must be positive"
            )));
        }
    }

    Ok(())
}
