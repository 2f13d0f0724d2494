use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::capture::Dimensions;
use crate::detect::TesseractConfig;

pub const ORIGIN_ENV: &str = "CODESCAN_ORIGIN";
pub const OWNER_ID_ENV: &str = "CODESCAN_OWNER_ID";

/// Tunables for the scan orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerSettings {
    pub sample_interval_ms: u64,
    pub resolution_poll_interval_ms: u64,
    pub resolution_poll_limit: u32,
    pub dimension_wait_attempts: u32,
    pub dimension_wait_interval_ms: u64,
    pub cycle_timeout_secs: u64,
    pub banner_hide_ms: u64,
    pub fallback_width: u32,
    pub fallback_height: u32,
    /// Origin the scanner is served from; camera access needs a secure one.
    pub origin: String,
    /// Owner attached to stored codes.
    pub owner_id: Option<String>,
    pub chime_enabled: bool,
    pub tesseract: TesseractConfig,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1200,
            resolution_poll_interval_ms: 200,
            resolution_poll_limit: 30,
            dimension_wait_attempts: 25,
            dimension_wait_interval_ms: 100,
            cycle_timeout_secs: 10,
            banner_hide_ms: 3500,
            fallback_width: 1280,
            fallback_height: 720,
            origin: "http://localhost".into(),
            owner_id: None,
            chime_enabled: true,
            tesseract: TesseractConfig::default(),
        }
    }
}

impl ScannerSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn resolution_poll_interval(&self) -> Duration {
        Duration::from_millis(self.resolution_poll_interval_ms.max(1))
    }

    pub fn dimension_wait_interval(&self) -> Duration {
        Duration::from_millis(self.dimension_wait_interval_ms)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn banner_hide_delay(&self) -> Duration {
        Duration::from_millis(self.banner_hide_ms)
    }

    pub fn fallback_dimensions(&self) -> Dimensions {
        Dimensions::new(self.fallback_width, self.fallback_height)
    }

    /// Applies `CODESCAN_ORIGIN` and `CODESCAN_OWNER_ID` when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(origin) = read_env(ORIGIN_ENV) {
            self.origin = origin;
        }
        if let Some(owner) = read_env(OWNER_ID_ENV) {
            self.owner_id = Some(owner);
        }
        self
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// JSON-file backed settings shared across the process.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScannerSettings>,
}

impl SettingsStore {
    /// Loads `path` if present; unreadable JSON falls back to defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed settings at {}: {err}", path.display());
                ScannerSettings::default()
            })
        } else {
            ScannerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Current settings with environment overrides applied.
    pub fn scanner(&self) -> ScannerSettings {
        let guard = match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone().with_env_overrides()
    }

    pub fn update_scanner(&self, settings: ScannerSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: ScannerSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings at {}", self.path.display()))?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &ScannerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
