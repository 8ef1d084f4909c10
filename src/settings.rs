use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::adaptive::DecisionConfig;
use crate::models::DifficultyBounds;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "settings";

use crate::{log_info, log_warn};

pub const ENV_CLASSIFIER_URL: &str = "FOCUSPLAY_CLASSIFIER_URL";
pub const ENV_GENERATOR_URL: &str = "FOCUSPLAY_GENERATOR_URL";
pub const ENV_MODEL: &str = "FOCUSPLAY_MODEL";
pub const ENV_DEBUG: &str = "FOCUSPLAY_DEBUG";
/// Where `run()` looks for the settings file.
pub const ENV_SETTINGS_PATH: &str = "FOCUSPLAY_SETTINGS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub health_timeout_ms: u64,
    /// Still image a camera daemon keeps overwriting. Without it the
    /// synthetic test card is used.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            request_timeout_ms: 2500,
            health_timeout_ms: 2000,
            snapshot_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplingSettings {
    pub tick_interval_ms: u64,
    pub min_interval_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            min_interval_ms: 3000,
            jpeg_quality: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorSettings {
    pub url: String,
    pub tags_url: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub num_predict: u32,
    pub timeout_ms: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".into(),
            tags_url: "http://localhost:11434/api/tags".into(),
            model: "gemma2:9b".into(),
            temperature: 0.4,
            top_p: 0.85,
            num_predict: 400,
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub classifier: ClassifierSettings,
    pub sampling: SamplingSettings,
    pub generator: GeneratorSettings,
    pub bounds: DifficultyBounds,
    pub decision: DecisionConfig,
    /// Log raw model output and every sampling tick.
    pub debug: bool,
}

impl EngineSettings {
    /// Apply `FOCUSPLAY_*` overrides from an arbitrary lookup (the process
    /// environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_CLASSIFIER_URL) {
            self.classifier.base_url = url;
        }
        if let Some(url) = lookup(ENV_GENERATOR_URL) {
            let base = url.trim_end_matches('/').to_string();
            let root = base.trim_end_matches("/api/generate").to_string();
            self.generator.url = format!("{root}/api/generate");
            self.generator.tags_url = format!("{root}/api/tags");
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.generator.model = model;
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            self.debug = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
    }

    /// Repair values a hand-edited file could get wrong.
    pub fn sanitized(mut self) -> Self {
        self.bounds = self.bounds.normalized();
        self.sampling.tick_interval_ms = self.sampling.tick_interval_ms.max(1);
        self.sampling.jpeg_quality = self.sampling.jpeg_quality.clamp(1, 100);
        self.decision.votes_to_step = self.decision.votes_to_step.max(1);
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    /// Load from `path`, falling back to defaults when the file is missing
    /// or unparsable, then apply environment overrides.
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = Self::read_file(&path)?;
        data.apply_overrides(|key| std::env::var(key).ok());

        Ok(Self {
            path,
            data: RwLock::new(data.sanitized()),
        })
    }

    fn read_file(path: &PathBuf) -> Result<EngineSettings> {
        if !path.exists() {
            log_info!("no settings at {}, using defaults", path.display());
            return Ok(EngineSettings::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Ok(serde_json::from_str(&contents).unwrap_or_else(|err| {
            log_warn!("ignoring unparsable settings {}: {}", path.display(), err);
            EngineSettings::default()
        }))
    }

    pub fn get(&self) -> EngineSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<F>(&self, edit: F) -> Result<EngineSettings>
    where
        F: FnOnce(&mut EngineSettings),
    {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        edit(&mut next);
        let next = next.sanitized();
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings dir {}", parent.display())
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let mut data: EngineSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", self.path.display()))?;
        data.apply_overrides(|key| std::env::var(key).ok());
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data.sanitized();
        Ok(())
    }
}
