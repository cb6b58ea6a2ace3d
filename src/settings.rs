use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::{engine::EngineConfig, renderer::Layout};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReaderSettings {
    layout: Layout,
    furigana_visible: bool,
    /// Engine tuning override. Absent means built-in defaults.
    engine: Option<EngineConfig>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            furigana_visible: true,
            engine: None,
        }
    }
}

/// Reader preferences, kept in a small JSON file next to the library.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ReaderSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!(
                    "settings at {} are unreadable, using defaults: {err}",
                    path.display()
                );
                ReaderSettings::default()
            })
        } else {
            ReaderSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn layout(&self) -> Layout {
        self.read().layout
    }

    pub fn update_layout(&self, layout: Layout) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|p| p.into_inner());
        guard.layout = layout;
        self.persist(&guard)
    }

    /// Furigana visibility only changes styling; positions are unaffected
    /// because gloss text never counts toward offsets.
    pub fn furigana_visible(&self) -> bool {
        self.read().furigana_visible
    }

    pub fn set_furigana_visible(&self, visible: bool) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|p| p.into_inner());
        guard.furigana_visible = visible;
        self.persist(&guard)
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.read().engine.clone().unwrap_or_default()
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read settings from {}", self.path.display()))?;
        let data: ReaderSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings at {}", self.path.display()))?;
        *self.data.write().unwrap_or_else(|p| p.into_inner()) = data;
        Ok(())
    }

    fn read(&self) -> ReaderSettings {
        self.data
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn persist(&self, data: &ReaderSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write settings to {}", self.path.display()))
    }
}
