use directories::ProjectDirs;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

lazy_static::lazy_static! {
    pub static ref DATA_FOLDER: Option<PathBuf> =
        std::env::var("MEET_FACES_DATA").ok().map(PathBuf::from);
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        std::env::var("MEET_FACES_CONFIG").ok().map(PathBuf::from);
}

/// Directories the application reads from and writes to. Filled in by
/// [`crate::Config::new`] before any file based source is consulted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub config_dir: PathBuf,
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("video", "hyper", "meet-faces")
}

pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = DATA_FOLDER.clone() {
        dir
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Some(dir) = CONFIG_FOLDER.clone() {
        dir
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}
