//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or [`Config::default`])
//! describes a working local setup with the Gemini backend.
//!
//! ```toml
//! [storage]
//! state_dir = "./uploads"
//! output_dir = "./uploads"
//!
//! [remote]
//! provider = "gemini"        # gemini | local | disabled
//! api_key_env = "GOOGLE_API_KEY"
//!
//! [ingest]
//! root = "./knowledge_base"
//! max_workers = 8
//!
//! [gate]
//! cooldown_secs = 86400
//! ```

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `gate.cooldown_secs`.
pub const COOLDOWN_ENV: &str = "ADVISOR_COOLDOWN_SECONDS";

/// Older name for [`COOLDOWN_ENV`], read when it is unset.
pub const LEGACY_COOLDOWN_ENV: &str = "INFOGRAPHIC_COOLDOWN_SECONDS";

const INDEX_HANDLE_FILE: &str = ".file_search_store.json";
const UPLOAD_CACHE_FILE: &str = "upload_cache.json";
const COOLDOWN_FILE: &str = "infographic_cooldown.json";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_state_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_reference_dir")]
    pub reference_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            output_dir: default_state_dir(),
            reference_dir: default_reference_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_reference_dir() -> PathBuf {
    PathBuf::from("./knowledge_base/plant_images")
}

impl StorageConfig {
    pub fn index_handle_path(&self) -> PathBuf {
        self.state_dir.join(INDEX_HANDLE_FILE)
    }

    pub fn upload_cache_path(&self) -> PathBuf {
        self.state_dir.join(UPLOAD_CACHE_FILE)
    }

    pub fn cooldown_path(&self) -> PathBuf {
        self.state_dir.join(COOLDOWN_FILE)
    }

    /// Where the `local` provider keeps its index directories.
    pub fn local_index_root(&self) -> PathBuf {
        self.state_dir.join("local_index")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            text_model: default_text_model(),
            image_model: default_image_model(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}
fn default_text_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}
fn default_image_model() -> String {
    "gemini-3-pro-image-preview".to_string()
}

impl RemoteConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_workers_per_cpu")]
    pub workers_per_cpu: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            root: default_ingest_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_workers: default_max_workers(),
            workers_per_cpu: default_workers_per_cpu(),
        }
    }
}

fn default_ingest_root() -> PathBuf {
    PathBuf::from("./knowledge_base")
}
fn default_include_globs() -> Vec<String> {
    ["pdf", "txt", "json", "doc", "docx"]
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}
fn default_max_workers() -> usize {
    8
}
fn default_workers_per_cpu() -> usize {
    2
}

impl IngestConfig {
    /// Worker count: a small multiple of available parallelism, capped.
    pub fn pool_size(&self) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cpus * self.workers_per_cpu).clamp(1, self.max_workers.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GateConfig {
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,
    #[serde(default)]
    pub extra_triggers: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            extra_triggers: Vec::new(),
        }
    }
}

fn default_cooldown_secs() -> i64 {
    advisory_harness_core::cooldown::DEFAULT_COOLDOWN_SECS
}

impl Config {
    /// Defaults rooted at `state_dir` (state and artifacts both live there).
    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        let mut config = Config::default();
        config.storage.output_dir = state_dir.clone();
        config.storage.state_dir = state_dir;
        config
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    apply_cooldown_env(&mut config, |name| std::env::var(name).ok())?;

    validate(&config)?;
    Ok(config)
}

/// Apply the cooldown override from [`COOLDOWN_ENV`], else
/// [`LEGACY_COOLDOWN_ENV`].
fn apply_cooldown_env(config: &mut Config, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    let found = [COOLDOWN_ENV, LEGACY_COOLDOWN_ENV]
        .into_iter()
        .find_map(|name| var(name).map(|raw| (name, raw)));
    if let Some((name, raw)) = found {
        config.gate.cooldown_secs = raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be an integer, got '{}'", name, raw))?;
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<()> {
    match config.remote.provider.as_str() {
        "gemini" | "local" | "disabled" => {}
        other => bail!(
            "Unknown remote provider: '{}'. Must be gemini, local, or disabled.",
            other
        ),
    }

    if config.remote.timeout_secs == 0 {
        bail!("remote.timeout_secs must be > 0");
    }

    if config.ingest.max_workers == 0 {
        bail!("ingest.max_workers must be >= 1");
    }
    if config.ingest.workers_per_cpu == 0 {
        bail!("ingest.workers_per_cpu must be >= 1");
    }
    if config.ingest.include_globs.is_empty() {
        bail!("ingest.include_globs must name at least one pattern");
    }
    for pattern in config
        .ingest
        .include_globs
        .iter()
        .chain(config.ingest.exclude_globs.iter())
    {
        Glob::new(pattern).with_context(|| format!("Invalid glob pattern: '{}'", pattern))?;
    }

    if config.gate.cooldown_secs < 0 {
        bail!("gate.cooldown_secs must be >= 0");
    }

    Ok(())
}
