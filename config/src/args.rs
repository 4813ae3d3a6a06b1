use clap::Parser;
use std::collections::HashMap;

/// Float the active speaker of a meeting into picture-in-picture while its tab is hidden.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Meeting URL to open. Overrides the stored configuration.
    #[clap(long)]
    pub url: Option<String>,

    /// Run the launched browser without a window.
    #[clap(long)]
    pub headless: Option<bool>,

    /// DevTools websocket URL of an already running browser to attach to
    /// instead of launching one, e.g. `ws://127.0.0.1:9222/devtools/browser/<id>`.
    #[clap(long)]
    pub connect: Option<String>,
}

impl config::Source for Args {
    fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
        Box::new((*self).clone())
    }

    fn collect(&self) -> Result<config::Map<String, config::Value>, config::ConfigError> {
        let mut cache = HashMap::<String, config::Value>::new();
        if let Some(url) = &self.url {
            cache.insert("url".to_string(), url.clone().into());
        }
        if let Some(headless) = self.headless {
            cache.insert("headless".to_string(), headless.into());
        }
        if let Some(connect) = &self.connect {
            cache.insert("connect".to_string(), connect.clone().into());
        }
        Ok(cache)
    }
}
