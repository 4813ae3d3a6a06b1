#[macro_use]
extern crate tracing;

use chromiumoxide::{
    browser,
    Browser,
    Handler,
};
use eyre::{
    Context as _,
    Result,
};
use meet_faces_config::BrowserConfig;
use std::path::PathBuf;

pub mod directory;
pub mod faces;
pub mod participant;
pub mod pip;
pub mod poller;
pub mod selector;
pub mod session;
pub mod settings_cache;
pub mod visibility;

pub use faces::Faces;
pub use participant::{
    Participant,
    Surface,
    SurfaceId,
};
pub use session::{
    Session,
    SessionState,
};

fn get_binary() -> Result<PathBuf> {
    // Chromium / Chrome can have different binary names
    let chrome = ["chromium", "google-chrome", "google-chrome-stable", "chrome"]
        .iter()
        .find_map(|name| {
            which::which(name).ok().map(|path| {
                debug!(?path, "found {} at", name);
                path
            })
        })
        .ok_or_else(|| eyre::eyre!("failed to find chromium or google-chrome binary"))?;
    Ok(chrome)
}

/// Attaches to a running browser when a debugging endpoint is configured,
/// otherwise launches one with the configured profile.
async fn create_browser(browser_config: &BrowserConfig) -> Result<(Browser, Handler)> {
    if let Some(endpoint) = &browser_config.connect {
        debug!(%endpoint, "Connecting to a running browser");
        return Browser::connect(endpoint.clone())
            .await
            .with_context(|| format!("failed to connect to browser at {endpoint}"));
    }

    let binary = get_binary()?;

    // Meeting media must play without a click on the page.
    let chrome_args = ["--no-startup-window", "--autoplay-policy=no-user-gesture-required"];

    let mut config = browser::BrowserConfig::builder();

    if !browser_config.headless {
        config = config.with_head().window_size(1280, 800).viewport(None)
    }

    let config = config
        .user_data_dir(&browser_config.user_data_dir)
        .chrome_executable(binary)
        .args(chrome_args)
        .build()
        .map_err(|e| eyre::eyre!(e))
        .context("failed to build browser config")?;

    browser::Browser::launch(config)
        .await
        .context("failed to launch browser")
}
