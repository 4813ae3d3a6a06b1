use crate::console::{
    self,
    Command,
};
use color_eyre::Result;
use meet_faces_browser::{
    Session,
    SessionState,
};
use meet_faces_config::{
    Args,
    Config,
    SettingsStore,
};
use std::sync::Arc;
use tokio::io::{
    AsyncBufReadExt as _,
    BufReader,
};

pub struct App {
    config: Config,
    store: Arc<dyn SettingsStore>,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let mut config = Config::new(args.clone())?;
        if let Err(err) = config.update_from_args(&args) {
            warn!("Could not remember the meeting URL: {err}");
        }
        let store = Arc::new(config.settings_store());
        debug!(path = ?store.path(), "Settings store");

        Ok(Self { config, store })
    }

    pub async fn run(self) -> Result<()> {
        let session = Session::spawn(&self.config, self.store.clone())?;
        if let Some(url) = &self.config.url {
            info!(%url, "Opening meeting, type `help` for commands");
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut state = session.state.clone();
        let mut last = SessionState::default();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }

                changed = state.changed() => {
                    if changed.is_err() {
                        warn!("Meeting session ended");
                        break;
                    }
                    let current = state.borrow_and_update().clone();
                    if last.running && !current.running {
                        info!("Meeting closed");
                        break;
                    }
                    if current.showing != last.showing {
                        match &current.showing {
                            Some(surface) => info!(%surface, "Showing in picture-in-picture"),
                            None => info!("Picture-in-picture released"),
                        }
                    }
                    last = current;
                }

                line = lines.next_line(), if stdin_open => {
                    let Some(line) = line? else {
                        debug!("Console input closed");
                        stdin_open = false;
                        continue;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<Command>() {
                        Ok(Command::Quit) => break,
                        Ok(command) => {
                            if let Err(err) = self.execute(&session, command).await {
                                error!("{command:?} failed: {err:?}");
                            }
                        }
                        Err(err) => eprintln!("{err}"),
                    }
                }
            }
        }

        session.close().await;
        Ok(())
    }

    async fn execute(&self, session: &Session, command: Command) -> Result<()> {
        match command {
            Command::Participants => {
                let participants = session.participants().await?;
                println!("{}", serde_json::to_string_pretty(&participants)?);
            }
            Command::Settings => {
                let settings = self.store.load().await?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            Command::Set(key, value) => {
                let settings = self.store.set(key, value).await?;
                info!(%key, value, "Setting stored");
                debug!(?settings);
                session.settings_changed();
            }
            Command::Reload => session.settings_changed(),
            Command::Help => println!("{}", console::help()),
            Command::Quit => {}
        }
        Ok(())
    }
}
