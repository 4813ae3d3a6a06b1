use crate::{
    directory::{
        Directory,
        PageProbe,
    },
    participant::Participant,
    pip::{
        Activation,
        PipController,
        PipHost,
    },
    poller::{
        tick_fn,
        Poller,
        PollerState,
    },
    selector::select,
    settings_cache::MemoizedSettings,
    visibility::{
        Visibility,
        VisibilityEvent,
        VisibilityMonitor,
    },
};
use eyre::Result;
use meet_faces_config::{
    Settings,
    SettingsStore,
};
use std::sync::Arc;
use tokio::sync::watch;

struct FacesInner {
    settings: MemoizedSettings,
    directory: Directory,
    pip: PipController,
    visibility: VisibilityMonitor,
}

/// Keeps the active speaker in picture-in-picture while the meeting is hidden.
///
/// Visibility edges start and stop the poll loop, every tick selects a
/// participant and hands it to the [`PipController`].
#[derive(Clone)]
pub struct Faces {
    inner: Arc<FacesInner>,
    poller: Poller,
}

impl Faces {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        probe: Arc<dyn PageProbe>,
        host: Arc<dyn PipHost>,
        visibility: watch::Receiver<Visibility>,
    ) -> Self {
        let pip = PipController::new(host);
        let inner = Arc::new(FacesInner {
            settings: MemoizedSettings::new(store),
            directory: Directory::new(probe, pip.clone()),
            pip,
            visibility: VisibilityMonitor::new(visibility),
        });

        let poller = Poller::new(tick_fn({
            let inner = inner.clone();
            move || {
                let inner = inner.clone();
                async move { inner.tick().await }
            }
        }));

        Self { inner, poller }
    }

    pub fn pip(&self) -> &PipController {
        &self.inner.pip
    }

    pub fn visibility(&self) -> &VisibilityMonitor {
        &self.inner.visibility
    }

    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    pub async fn handle_visibility(&self, event: VisibilityEvent) {
        match event {
            VisibilityEvent::Hidden => self.on_hidden().await,
            VisibilityEvent::Shown => self.on_shown().await,
        }
    }

    pub async fn on_hidden(&self) {
        if !self.inner.settings.get().await.is_enabled {
            debug!("Meeting hidden, but disabled");
            return;
        }
        self.poller.start();
    }

    pub async fn on_shown(&self) {
        self.poller.stop();
        self.inner.pip.deactivate().await;
    }

    /// Re-reads the settings and follows a flip of the master switch.
    pub async fn settings_changed(&self) -> Settings {
        let was_enabled = self.inner.settings.get().await.is_enabled;
        let settings = self.inner.settings.reload().await;
        info!(?settings, "Settings changed");

        if was_enabled != settings.is_enabled {
            if !settings.is_enabled {
                self.poller.stop();
                self.inner.pip.deactivate().await;
            } else if self.inner.visibility.is_hidden() {
                self.poller.start();
            }
        }

        settings
    }

    pub async fn participants(&self) -> Result<Vec<Participant>> {
        self.inner.directory.scan().await
    }
}

impl FacesInner {
    async fn tick(&self) -> Result<bool> {
        let settings = self.settings.get().await;
        if !self.visibility.is_hidden() {
            debug!("Meeting visible again");
            return Ok(false);
        }

        if !settings.is_enabled {
            self.pip.deactivate().await;
            return Ok(false);
        }

        let participants = self.directory.scan().await?;
        if settings.debugging {
            info!(?participants, "Scanned participants");
        } else {
            trace!(?participants, "Scanned participants");
        }

        let Some(next) = select(&participants, &settings) else {
            return Ok(true);
        };
        match self.pip.activate(next).await {
            Activation::Activated | Activation::AlreadyActive => {}
            outcome => debug!(participant = %next.name, %outcome, "Nothing shown this tick"),
        }

        Ok(true)
    }
}
