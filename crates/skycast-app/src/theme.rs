//! Theme preference: fixed cycle, persisted across restarts.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use skycast_core::{Emitter, TelemetryEvent};

/// Visual theme, cycling Light -> Dark -> HighContrastAlt -> Light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemePreference {
    #[default]
    Light,
    Dark,
    HighContrastAlt,
}

impl ThemePreference {
    pub fn next(self) -> Self {
        match self {
            ThemePreference::Light => ThemePreference::Dark,
            ThemePreference::Dark => ThemePreference::HighContrastAlt,
            ThemePreference::HighContrastAlt => ThemePreference::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
            ThemePreference::HighContrastAlt => "high_contrast_alt",
        }
    }

    /// Parse a persisted value. Unknown strings yield `None`; the caller
    /// treats that the same as an absent value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "light" => Some(ThemePreference::Light),
            "dark" => Some(ThemePreference::Dark),
            "high_contrast_alt" => Some(ThemePreference::HighContrastAlt),
            _ => None,
        }
    }
}

/// Durable single-key storage for the theme value.
pub trait PreferenceStore: Send {
    fn read(&self) -> io::Result<Option<String>>;
    fn write(&self, value: &str) -> io::Result<()>;
}

/// File-backed store under the config directory. The file handle is
/// scoped to each call and released on every exit path.
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join("theme"),
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn read(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, value: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Flush to disk before reporting success, so the value survives
        // power loss, not just process exit
        let mut file = std::fs::File::create(&self.path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()
    }
}

/// Sole owner of the current theme value.
pub struct ThemeStateManager {
    current: ThemePreference,
    store: Box<dyn PreferenceStore>,
    telemetry: Emitter,
}

impl ThemeStateManager {
    /// Load the persisted theme. Absent, unreadable, or corrupt values
    /// all fall back to Light; loading never fails.
    pub fn load(store: Box<dyn PreferenceStore>, telemetry: Emitter) -> Self {
        let current = match store.read() {
            Ok(Some(raw)) => match ThemePreference::parse(&raw) {
                Some(theme) => theme,
                None => {
                    tracing::warn!("Ignoring corrupt persisted theme value: {:?}", raw.trim());
                    ThemePreference::default()
                }
            },
            Ok(None) => ThemePreference::default(),
            Err(e) => {
                tracing::warn!("Failed to read persisted theme, using default: {}", e);
                ThemePreference::default()
            }
        };

        tracing::debug!("Loaded theme: {}", current.as_str());
        Self {
            current,
            store,
            telemetry,
        }
    }

    pub fn current(&self) -> ThemePreference {
        self.current
    }

    /// Advance to the next theme in the cycle, persisting the new value
    /// before it takes effect. On a write failure the current theme is
    /// left unchanged, so a successful return always means durable.
    pub fn cycle(&mut self) -> Result<ThemePreference> {
        let next = self.current.next();
        self.store
            .write(next.as_str())
            .context("Failed to persist theme preference")?;
        self.current = next;

        self.telemetry
            .emit(TelemetryEvent::new("theme_cycled").with("theme", next.as_str()));
        tracing::info!("Theme cycled to {}", next.as_str());
        Ok(next)
    }
}
