//! Application configuration for lessongen.
//!
//! User config lives at `~/.lessongen/lessongen.toml` and only names the
//! environment variables that hold credentials. Secrets themselves come from
//! the environment (optionally seeded from `.env.local` / `.env`).
//! [`Settings::resolve`] merges both into the runtime struct that every
//! component constructor takes by reference.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LessonGenError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lessongen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lessongen";

// ---------------------------------------------------------------------------
// Config structs (matching lessongen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Completion service settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Pause between generator calls.
    #[serde(default)]
    pub pacing: PacingConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Name of the env var holding the store base URL.
    #[serde(default = "default_store_url_env")]
    pub url_env: String,

    /// Name of the env var holding the service credential.
    #[serde(default = "default_store_key_env")]
    pub key_env: String,

    /// Collection holding curriculum skills.
    #[serde(default = "default_skills_table")]
    pub skills_table: String,

    /// Collection receiving generated lessons.
    #[serde(default = "default_lessons_table")]
    pub lessons_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url_env: default_store_url_env(),
            key_env: default_store_key_env(),
            skills_table: default_skills_table(),
            lessons_table: default_lessons_table(),
        }
    }
}

fn default_store_url_env() -> String {
    "NEXT_PUBLIC_SUPABASE_URL".into()
}
fn default_store_key_env() -> String {
    "SUPABASE_SERVICE_ROLE_KEY".into()
}
fn default_skills_table() -> String {
    "curriculum_skills".into()
}
fn default_lessons_table() -> String {
    "lesson_content".into()
}

/// `[generator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Name of the env var holding the completion API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat-completion endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output token budget per lesson.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_key_env() -> String {
    "GROK_API_KEY".into()
}
fn default_endpoint() -> String {
    "https://api.x.ai/v1/chat/completions".into()
}
fn default_model() -> String {
    "grok-beta".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4000
}

/// `[pacing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Seconds to wait after each generated (or failed) item.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
        }
    }
}

fn default_delay_secs() -> u64 {
    3
}

// ---------------------------------------------------------------------------
// Runtime settings (config file + environment)
// ---------------------------------------------------------------------------

/// Connection details for the record store.
#[derive(Clone)]
pub struct StoreSettings {
    /// Base URL, e.g. `https://xyz.supabase.co`.
    pub base_url: Url,
    /// Service credential, sent as `apikey` and bearer token.
    pub service_key: String,
    pub skills_table: String,
    pub lessons_table: String,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("base_url", &self.base_url.as_str())
            .field("service_key", &"<redacted>")
            .field("skills_table", &self.skills_table)
            .field("lessons_table", &self.lessons_table)
            .finish()
    }
}

/// Connection details for the completion service.
#[derive(Clone)]
pub struct GeneratorSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl fmt::Debug for GeneratorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Everything a run needs, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreSettings,
    pub generator: GeneratorSettings,
    /// Pause after each non-skipped item.
    pub pacing_delay: Duration,
}

/// Presence of each required value, printed when startup fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialReport {
    /// `(label, env var name, present)` in a fixed order.
    pub entries: Vec<(&'static str, String, bool)>,
}

impl fmt::Display for CredentialReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, var, present) in &self.entries {
            let mark = if *present { '✓' } else { '✗' };
            writeln!(f, "  {label} ({var}): {mark}")?;
        }
        Ok(())
    }
}

impl Settings {
    /// Resolve runtime settings from the file config and an env lookup.
    ///
    /// Empty values count as missing. When anything is missing the error
    /// carries the full presence report.
    pub fn resolve<F>(config: &AppConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let store_url = fetch(&config.store.url_env);
        let store_key = fetch(&config.store.key_env);
        let api_key = fetch(&config.generator.api_key_env);

        let report = CredentialReport {
            entries: vec![
                ("store URL", config.store.url_env.clone(), store_url.is_some()),
                ("store service key", config.store.key_env.clone(), store_key.is_some()),
                ("generator API key", config.generator.api_key_env.clone(), api_key.is_some()),
            ],
        };

        let (Some(store_url), Some(store_key), Some(api_key)) = (store_url, store_key, api_key)
        else {
            return Err(LessonGenError::config(format!(
                "missing required environment variables:\n{report}"
            )));
        };

        let base_url = Url::parse(store_url.trim()).map_err(|e| {
            LessonGenError::config(format!(
                "{} is not a valid URL ({store_url}): {e}",
                config.store.url_env
            ))
        })?;

        Ok(Self {
            store: StoreSettings {
                base_url,
                service_key: store_key,
                skills_table: config.store.skills_table.clone(),
                lessons_table: config.store.lessons_table.clone(),
            },
            generator: GeneratorSettings {
                endpoint: config.generator.endpoint.clone(),
                api_key,
                model: config.generator.model.clone(),
                temperature: config.generator.temperature,
                max_tokens: config.generator.max_tokens,
            },
            pacing_delay: Duration::from_secs(config.pacing.delay_secs),
        })
    }

    /// Resolve against the process environment.
    pub fn from_env(config: &AppConfig) -> Result<Self> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lessongen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LessonGenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lessongen/lessongen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LessonGenError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        LessonGenError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LessonGenError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LessonGenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LessonGenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
