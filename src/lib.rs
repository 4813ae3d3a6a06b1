#[macro_use]
extern crate tracing;

mod app;
mod console;

pub use app::App;
pub use console::Command;
pub use meet_faces_config::Args;

use color_eyre::Result;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

const DEFAULT_LOG_FILTER: &str = "warn,meet_faces=info,meet_faces_browser=info,meet_faces_config=info";

/// Logs go to stderr so that stdout only carries command output.
pub fn init_logging() -> Result<()> {
    color_eyre::install()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;

    Ok(())
}
