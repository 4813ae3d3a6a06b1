use crate::participant::Participant;
use derive_more::Display;
use tokio::sync::oneshot;

#[derive(Debug, Display)]
pub enum SessionMessage {
    /// The settings store was written, reload and apply.
    SettingsChanged,
    #[display("Participants")]
    Participants(oneshot::Sender<eyre::Result<Vec<Participant>>>),
    Close,
}
