use async_trait::async_trait;
use eyre::{
    Context as _,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    io::ErrorKind,
    path::{
        Path,
        PathBuf,
    },
};
use strum::{
    Display,
    EnumIter,
    EnumString,
};

const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// User facing switches. Keys that are absent from the store take the
/// defaults below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Master switch for the whole feature.
    pub is_enabled: bool,
    /// Whether the local user may be picked.
    pub include_you: bool,
    pub debugging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            is_enabled: true,
            include_you: false,
            debugging: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum SettingsKey {
    #[strum(to_string = "isEnabled", serialize = "enabled", serialize = "is-enabled")]
    IsEnabled,
    #[strum(to_string = "includeYou", serialize = "include-you")]
    IncludeYou,
    #[strum(to_string = "debugging")]
    Debugging,
}

impl Settings {
    pub fn get(&self, key: SettingsKey) -> bool {
        match key {
            SettingsKey::IsEnabled => self.is_enabled,
            SettingsKey::IncludeYou => self.include_you,
            SettingsKey::Debugging => self.debugging,
        }
    }

    pub fn with(mut self, key: SettingsKey, value: bool) -> Self {
        match key {
            SettingsKey::IsEnabled => self.is_enabled = value,
            SettingsKey::IncludeYou => self.include_you = value,
            SettingsKey::Debugging => self.debugging = value,
        }
        self
    }
}

/// Persistent storage of [`Settings`].
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<Settings>;

    async fn save(&self, settings: &Settings) -> Result<()>;

    async fn set(&self, key: SettingsKey, value: bool) -> Result<Settings> {
        let settings = self.load().await?.with(key, value);
        self.save(&settings).await?;
        Ok(settings)
    }
}

/// Stores settings as YAML inside the data directory.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SETTINGS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<Settings> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "No settings stored yet, using defaults");
                return Ok(Settings::default());
            }
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("Failed to read settings from {:?}", self.path));
            }
        };

        // An empty document deserializes to unit, not to a map.
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }

        let settings =
            serde_yml::from_str(&content).wrap_err_with(|| format!("Failed to parse settings in {:?}", self.path))?;
        debug!(?settings, "Loaded all settings");
        Ok(settings)
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create settings directory")?;
        }
        let content = serde_yml::to_string(settings).context("Failed to serialize settings")?;
        tokio::fs::write(&self.path, content)
            .await
            .wrap_err_with(|| format!("Failed to write settings to {:?}", self.path))
    }
}
