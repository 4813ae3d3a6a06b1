use crate::participant::Participant;
use eyre::{
    OptionExt as _,
    Result,
};
use inner::SessionInner;
use meet_faces_config::{
    BrowserConfig,
    Config,
    SettingsStore,
};
pub use messages::SessionMessage;
pub use state::SessionState;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{
        unbounded_channel,
        UnboundedSender,
    },
    oneshot,
    watch,
};
use tokio_util::sync::{
    CancellationToken,
    DropGuard,
};

mod inner;
mod messages;
mod page;
mod state;

/// A meeting tab in a browser, with faces running inside it.
///
/// Dropping the last clone cancels the session task.
#[derive(Debug, Clone)]
pub struct Session {
    pub state: watch::Receiver<SessionState>,
    _session_task_guard: Arc<DropGuard>,
    sender: UnboundedSender<SessionMessage>,
}

impl Session {
    pub fn spawn(config: &Config, store: Arc<dyn SettingsStore>) -> Result<Self> {
        let url = config.url.clone().ok_or_eyre("No meeting URL provided in the config")?;
        let browser_config = BrowserConfig::from(config);
        let markers = config.markers.clone();

        let (sender, receiver) = unbounded_channel::<SessionMessage>();
        let task_cancellation_token = CancellationToken::new();
        let task_cancellation_guard = task_cancellation_token.clone().drop_guard();
        let (state_sender, state_receiver) = watch::channel(SessionState::default());

        tokio::task::spawn(async move {
            tokio::select! {
                biased;
                _ = task_cancellation_token.cancelled() => {},

                result = SessionInner::run(url, browser_config, markers, store, receiver, state_sender) => {
                    if let Err(err) = result {
                        error!("Meeting session failed: {err:?}");
                    }
                }
            };

            debug!("Session task finished");
        });

        Ok(Self {
            state: state_receiver,
            _session_task_guard: Arc::new(task_cancellation_guard),
            sender,
        })
    }

    fn send(&self, message: SessionMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|err| eyre::eyre!("Session is gone, could not send {}", err.0))
    }

    /// Tells the session the settings store was written.
    pub fn settings_changed(&self) {
        if let Err(err) = self.send(SessionMessage::SettingsChanged) {
            error!("{err}");
        }
    }

    /// Scans the meeting page now, regardless of visibility.
    pub async fn participants(&self) -> Result<Vec<Participant>> {
        let (reply, response) = oneshot::channel();
        self.send(SessionMessage::Participants(reply))?;
        response.await.map_err(|_| eyre::eyre!("Session closed before answering"))?
    }

    pub async fn close(mut self) {
        if self.send(SessionMessage::Close).is_err() {
            debug!("Session already closed");
            return;
        }
        if let Err(err) = self.state.wait_for(|state| !state.running).await {
            debug!("Session ended without reporting: {err}");
        }
    }
}
