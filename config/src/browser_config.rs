use std::path::{
    Path,
    PathBuf,
};
use temp_dir::TempDir;

#[derive(Clone, Debug)]
pub enum UserDataDir {
    /// Use a temporary directory for user data. Will be deleted on drop.
    Temp { temp_dir: TempDir, user_data_dir: PathBuf },
    /// Use a custom directory for user data.
    Custom(PathBuf),
}

impl AsRef<Path> for UserDataDir {
    fn as_ref(&self) -> &Path {
        match self {
            UserDataDir::Temp { user_data_dir, .. } => user_data_dir,
            UserDataDir::Custom(user_data_dir) => user_data_dir,
        }
    }
}

impl Default for UserDataDir {
    fn default() -> Self {
        let temp_dir = temp_dir::TempDir::with_prefix("meet-faces").expect("Failed to create temp dir");
        let user_data_dir = temp_dir.path().to_path_buf();
        Self::Temp {
            temp_dir,
            user_data_dir,
        }
    }
}

/// Everything needed to launch (or attach to) the browser hosting the meeting.
#[derive(Clone, Debug)]
pub struct BrowserConfig {
    pub user_data_dir: UserDataDir,
    pub headless: bool,
    pub connect: Option<String>,
}

impl From<&super::Config> for BrowserConfig {
    fn from(config: &super::Config) -> Self {
        // A persistent profile keeps the meeting login between runs.
        let user_data_dir = if config.data_dir().as_os_str().is_empty() {
            UserDataDir::default()
        } else {
            UserDataDir::Custom(config.data_dir().join("chromium-profile"))
        };
        Self {
            user_data_dir,
            headless: config.headless,
            connect: config.connect.clone(),
        }
    }
}
