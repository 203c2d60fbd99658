//! Persisted workspace settings.
//!
//! Settings load through a [`SettingsStore`] collaborator, merge with
//! defaults for anything missing, and clamp every numeric to a safe range
//! before use. Saves are debounced so slider scrubbing does not hammer the
//! store; malformed stored JSON falls back to defaults with a warning.

use notegraph_layout::ForceParams;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Visual display preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub show_labels: bool,
    pub node_scale: f32,
    pub edge_opacity: f32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_labels: true,
            node_scale: 1.0,
            edge_opacity: 0.6,
        }
    }
}

/// What the graph includes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub show_phantoms: bool,
    pub include_folders: bool,
    pub include_tags: bool,
    pub exclude_patterns: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            show_phantoms: true,
            include_folders: false,
            include_tags: false,
            exclude_patterns: Vec::new(),
        }
    }
}

/// Everything persisted per workspace. Unknown keys in stored JSON are
/// ignored; missing keys take defaults field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub display: DisplaySettings,
    pub filters: FilterSettings,
    pub force: ForceParams,
    /// Background color as a hex string.
    pub background: String,
}

impl WorkspaceSettings {
    /// Clamp every numeric to its safe range. Stored files are user-editable,
    /// so out-of-range values must not reach the simulation or renderer.
    pub fn clamped(mut self) -> Self {
        self.display.node_scale = self.display.node_scale.clamp(0.1, 5.0);
        self.display.edge_opacity = self.display.edge_opacity.clamp(0.0, 1.0);
        self.force = self.force.clamped();
        if self.background.is_empty() {
            self.background = "#10141a".to_owned();
        }
        self
    }
}

/// Where settings JSON lives. Implementations decide the medium (file,
/// plugin data store, memory).
pub trait SettingsStore {
    fn load(&self) -> anyhow::Result<Option<String>>;
    fn save(&self, json: &str) -> anyhow::Result<()>;
}

/// File-backed store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: std::path::PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> anyhow::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(json)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, json: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Owns the live settings and the debounced persistence cycle.
pub struct SettingsManager {
    store: Box<dyn SettingsStore + Send>,
    settings: WorkspaceSettings,
    debounce_ms: u64,
    dirty_since: Option<u64>,
}

impl SettingsManager {
    pub const DEFAULT_DEBOUNCE_MS: u64 = 800;

    /// Load from the store, falling back to defaults on absence or
    /// malformed content.
    pub fn load(store: Box<dyn SettingsStore + Send>) -> Self {
        let settings = match store.load() {
            Ok(Some(json)) => match serde_json::from_str::<WorkspaceSettings>(&json) {
                Ok(parsed) => parsed.clamped(),
                Err(err) => {
                    warn!(error = %err, "stored settings malformed, using defaults");
                    WorkspaceSettings::default().clamped()
                }
            },
            Ok(None) => WorkspaceSettings::default().clamped(),
            Err(err) => {
                warn!(error = %err, "settings store unreadable, using defaults");
                WorkspaceSettings::default().clamped()
            }
        };

        Self {
            store,
            settings,
            debounce_ms: Self::DEFAULT_DEBOUNCE_MS,
            dirty_since: None,
        }
    }

    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    /// Mutate settings; the change persists after the debounce delay.
    pub fn update(&mut self, now_ms: u64, apply: impl FnOnce(&mut WorkspaceSettings)) {
        apply(&mut self.settings);
        self.settings = self.settings.clone().clamped();
        self.dirty_since = Some(now_ms);
    }

    /// Persist if a change has been pending longer than the debounce delay.
    pub fn tick(&mut self, now_ms: u64) {
        if self
            .dirty_since
            .is_some_and(|since| now_ms.saturating_sub(since) >= self.debounce_ms)
        {
            self.persist();
        }
    }

    /// Persist any pending change immediately (disposal path).
    pub fn flush(&mut self) {
        if self.dirty_since.is_some() {
            self.persist();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    fn persist(&mut self) {
        match serde_json::to_string_pretty(&self.settings) {
            Ok(json) => {
                if let Err(err) = self.store.save(&json) {
                    warn!(error = %err, "failed to save settings");
                } else {
                    debug!("settings saved");
                    self.dirty_since = None;
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize settings"),
        }
    }
}
