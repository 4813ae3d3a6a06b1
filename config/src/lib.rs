#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod browser_config;
mod markers;
mod settings;

use app_config::AppConfig;
pub use app_config::{
    get_config_dir,
    get_data_dir,
};
pub use args::Args;
pub use browser_config::{
    BrowserConfig,
    UserDataDir,
};
use color_eyre::Result;
use eyre::Context as _;
pub use markers::PageMarkers;
use serde::{
    Deserialize,
    Serialize,
};
pub use settings::{
    FileSettingsStore,
    Settings,
    SettingsKey,
    SettingsKeyIter,
    SettingsStore,
};
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    pub app_config: AppConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<url::Url>,
    #[serde(default)]
    pub headless: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<String>,
    #[serde(default)]
    pub markers: PageMarkers,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let config_files = [("config.yaml", config::FileFormat::Yaml)];

        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;

        Ok(cfg)
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    pub fn settings_store(&self) -> FileSettingsStore {
        FileSettingsStore::in_dir(self.data_dir())
    }

    /// Persists the parts of the configuration that differ from the defaults.
    pub fn save(&self) -> Result<()> {
        let default = Self::default();
        let mut clone = self.clone();

        if self.url == default.url {
            clone.url = None;
        }
        if self.connect == default.connect {
            clone.connect = None;
        }

        std::fs::create_dir_all(&self.app_config.config_dir).context("Failed to create config directory")?;
        let path = self.app_config.config_dir.join("config.yaml");
        let content = serde_yml::to_string(&clone).context("Failed to serialize config")?;
        std::fs::write(&path, content).wrap_err_with(|| format!("Failed to write config to {:?}", path))
    }

    /// Remembers the meeting URL passed on the command line so the next start
    /// opens it without arguments.
    #[instrument(level = "debug", skip(self, args))]
    pub fn update_from_args(&mut self, args: &Args) -> Result<()> {
        let Some(url) = args.url.as_deref().and_then(|url| url::Url::parse(url).ok()) else {
            debug!("No configuration changes from command-line arguments.");
            return Ok(());
        };

        let stored = Self::new(Args::default())
            .map(|config| config.url)
            .unwrap_or_default();
        if stored.as_ref() == Some(&url) {
            return Ok(());
        }

        info!(old = ?stored, new = %url, "Updating URL from args");
        self.url = Some(url);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_parses() {
        let config = Config::default();
        assert!(!config.headless);
        assert_eq!(config.url, None);
        assert_eq!(config.markers, PageMarkers::default());
    }
}
