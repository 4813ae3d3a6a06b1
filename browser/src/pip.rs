use crate::participant::{
    Participant,
    SurfaceId,
};
use async_trait::async_trait;
use eyre::Result;
use std::{
    collections::HashSet,
    sync::Arc,
};
use tokio::sync::watch;

/// The browser's picture-in-picture capability.
#[async_trait]
pub trait PipHost: Send + Sync {
    /// Asks the browser to float the surface. Fails when the browser refuses.
    async fn request(&self, surface: &SurfaceId) -> Result<()>;

    /// Leaves picture-in-picture, whichever surface holds it.
    async fn exit(&self) -> Result<()>;

    /// Start reporting when the surface leaves picture-in-picture.
    async fn watch_exit(&self, surface: &SurfaceId) -> Result<()>;

    async fn unwatch_exit(&self, surface: &SurfaceId) -> Result<()>;
}

/// Who holds the single picture-in-picture slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PipState {
    #[default]
    Idle,
    Active(SurfaceId),
}

impl PipState {
    pub fn holder(&self) -> Option<&SurfaceId> {
        match self {
            PipState::Idle => None,
            PipState::Active(surface) => Some(surface),
        }
    }
}

/// Outcome of [`PipController::activate`]. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Activation {
    Activated,
    AlreadyActive,
    NoEligibleSurface,
    Rejected,
}

/// Bookkeeping for the picture-in-picture slot.
///
/// The holder is kept as a [`SurfaceId`] only. When the surface disappears
/// or stops being the browser's picture-in-picture element without an exit
/// notification, the next [`PipController::reconcile`] drops it.
#[derive(Clone)]
pub struct PipController {
    host: Arc<dyn PipHost>,
    state: Arc<watch::Sender<PipState>>,
}

impl PipController {
    pub fn new(host: Arc<dyn PipHost>) -> Self {
        let (state, _) = watch::channel(PipState::Idle);
        Self {
            host,
            state: Arc::new(state),
        }
    }

    pub fn holder(&self) -> Option<SurfaceId> {
        self.state.borrow().holder().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipState> {
        self.state.subscribe()
    }

    pub async fn activate(&self, participant: &Participant) -> Activation {
        let Some(surface) = participant.eligible_surface() else {
            return Activation::NoEligibleSurface;
        };

        if self.holder().as_ref() == Some(&surface.id) {
            return Activation::AlreadyActive;
        }

        info!(participant = %participant.name, surface = %surface.id, "Activating picture-in-picture");
        if let Err(err) = self.host.request(&surface.id).await {
            warn!(participant = %participant.name, "Picture-in-picture request rejected: {err}");
            return Activation::Rejected;
        }

        let previous = self.state.send_replace(PipState::Active(surface.id.clone()));
        if let PipState::Active(previous) = previous {
            // The browser already moved the slot, only our listener is left.
            if previous != surface.id {
                if let Err(err) = self.host.unwatch_exit(&previous).await {
                    debug!(surface = %previous, "Failed to stop watching surface: {err}");
                }
            }
        }

        if let Err(err) = self.host.watch_exit(&surface.id).await {
            warn!(surface = %surface.id, "Failed to watch picture-in-picture exit: {err}");
        }

        Activation::Activated
    }

    pub async fn deactivate(&self) {
        let PipState::Active(surface) = self.state.send_replace(PipState::Idle) else {
            return;
        };

        debug!(%surface, "Leaving picture-in-picture");
        if let Err(err) = self.host.unwatch_exit(&surface).await {
            debug!(%surface, "Failed to stop watching surface: {err}");
        }
        if let Err(err) = self.host.exit().await {
            warn!(%surface, "Failed to exit picture-in-picture: {err}");
        }
    }

    /// Handles the browser ending picture-in-picture for `surface` on its own.
    /// Notifications for anything but the current holder are ignored.
    pub async fn on_exit(&self, surface: &SurfaceId) -> bool {
        let cleared = self.state.send_if_modified(|state| match state {
            PipState::Active(holder) if holder == surface => {
                *state = PipState::Idle;
                true
            }
            _ => false,
        });

        if cleared {
            debug!(%surface, "Picture-in-picture closed by the browser");
            if let Err(err) = self.host.unwatch_exit(surface).await {
                debug!(%surface, "Failed to stop watching surface: {err}");
            }
        } else {
            trace!(%surface, "Ignoring stale picture-in-picture exit");
        }

        cleared
    }

    /// Forgets the holder when its surface is no longer part of the page, or
    /// when the browser shows something else in picture-in-picture.
    pub fn reconcile(&self, live: &HashSet<SurfaceId>, showing: Option<&SurfaceId>) {
        self.state.send_if_modified(|state| match state {
            PipState::Active(holder) if !live.contains(holder) => {
                debug!(surface = %holder, "Picture-in-picture surface left the page");
                *state = PipState::Idle;
                true
            }
            PipState::Active(holder) if showing != Some(&*holder) => {
                debug!(surface = %holder, ?showing, "Picture-in-picture no longer shows the holder");
                *state = PipState::Idle;
                true
            }
            _ => false,
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum HostCall {
        Request(SurfaceId),
        Exit,
        Watch(SurfaceId),
        Unwatch(SurfaceId),
    }

    /// Records every call; rejects requests for surfaces listed in `reject`.
    #[derive(Default)]
    pub(crate) struct FakeHost {
        pub(crate) calls: Mutex<Vec<HostCall>>,
        pub(crate) reject: Mutex<HashSet<SurfaceId>>,
        /// What the browser would report as its picture-in-picture element.
        pub(crate) showing: Mutex<Option<SurfaceId>>,
    }

    impl FakeHost {
        pub(crate) fn requests(&self) -> usize {
            self.calls
                .lock()
                .iter()
                .filter(|call| matches!(call, HostCall::Request(_)))
                .count()
        }

        pub(crate) fn exits(&self) -> usize {
            self.calls.lock().iter().filter(|call| **call == HostCall::Exit).count()
        }
    }

    #[async_trait]
    impl PipHost for FakeHost {
        async fn request(&self, surface: &SurfaceId) -> Result<()> {
            self.calls.lock().push(HostCall::Request(surface.clone()));
            if self.reject.lock().contains(surface) {
                eyre::bail!("NotAllowedError: must be handling a user gesture");
            }
            *self.showing.lock() = Some(surface.clone());
            Ok(())
        }

        async fn exit(&self) -> Result<()> {
            self.calls.lock().push(HostCall::Exit);
            *self.showing.lock() = None;
            Ok(())
        }

        async fn watch_exit(&self, surface: &SurfaceId) -> Result<()> {
            self.calls.lock().push(HostCall::Watch(surface.clone()));
            Ok(())
        }

        async fn unwatch_exit(&self, surface: &SurfaceId) -> Result<()> {
            self.calls.lock().push(HostCall::Unwatch(surface.clone()));
            Ok(())
        }
    }

    fn controller() -> (Arc<FakeHost>, PipController) {
        let host = Arc::new(FakeHost::default());
        (host.clone(), PipController::new(host))
    }

    #[tokio::test]
    async fn activate_is_idempotent() {
        let (host, pip) = controller();
        let ada = Participant::named("Ada").with_video("1");

        assert_eq!(pip.activate(&ada).await, Activation::Activated);
        assert_eq!(pip.activate(&ada).await, Activation::AlreadyActive);
        assert_eq!(host.requests(), 1);
        assert_eq!(pip.holder(), Some("1".into()));
    }

    #[tokio::test]
    async fn participant_without_displayed_surface_is_a_no_op() {
        let (host, pip) = controller();
        let mut hidden = Participant::named("Ada").with_video("1");
        hidden.surfaces[0].displayed = false;

        assert_eq!(pip.activate(&Participant::named("Off")).await, Activation::NoEligibleSurface);
        assert_eq!(pip.activate(&hidden).await, Activation::NoEligibleSurface);
        assert!(host.calls.lock().is_empty());
        assert_eq!(pip.holder(), None);
    }

    #[tokio::test]
    async fn rejected_request_keeps_state() {
        let (host, pip) = controller();
        host.reject.lock().insert("1".into());

        assert_eq!(
            pip.activate(&Participant::named("Ada").with_video("1")).await,
            Activation::Rejected
        );
        assert_eq!(*pip.subscribe().borrow(), PipState::Idle);
        assert_eq!(*host.calls.lock(), vec![HostCall::Request("1".into())]);
    }

    #[tokio::test]
    async fn stale_exit_does_not_clear_new_holder() {
        let (host, pip) = controller();
        pip.activate(&Participant::named("A").with_video("a")).await;
        pip.activate(&Participant::named("B").with_video("b")).await;
        assert_eq!(pip.holder(), Some("b".into()));

        assert!(!pip.on_exit(&"a".into()).await);
        assert_eq!(pip.holder(), Some("b".into()));
        assert_eq!(
            *host.calls.lock(),
            vec![
                HostCall::Request("a".into()),
                HostCall::Watch("a".into()),
                HostCall::Request("b".into()),
                HostCall::Unwatch("a".into()),
                HostCall::Watch("b".into()),
            ]
        );
    }

    #[tokio::test]
    async fn exit_notification_clears_once() {
        let (host, pip) = controller();
        pip.activate(&Participant::named("A").with_video("a")).await;

        assert!(pip.on_exit(&"a".into()).await);
        assert!(!pip.on_exit(&"a".into()).await);
        pip.deactivate().await;

        assert_eq!(pip.holder(), None);
        assert_eq!(host.exits(), 0);
    }

    #[tokio::test]
    async fn deactivate_releases_holder() {
        let (host, pip) = controller();
        pip.deactivate().await;
        assert!(host.calls.lock().is_empty());

        pip.activate(&Participant::named("A").with_video("a")).await;
        pip.deactivate().await;
        assert_eq!(pip.holder(), None);
        assert_eq!(host.exits(), 1);
        assert!(host.calls.lock().contains(&HostCall::Unwatch("a".into())));

        // A late exit for the released surface changes nothing.
        assert!(!pip.on_exit(&"a".into()).await);
    }

    #[tokio::test]
    async fn reconcile_drops_vanished_holder() {
        let (_host, pip) = controller();
        pip.activate(&Participant::named("A").with_video("a")).await;

        let live = HashSet::from([SurfaceId::from("a"), SurfaceId::from("b")]);
        pip.reconcile(&live, Some(&"a".into()));
        assert_eq!(pip.holder(), Some("a".into()));

        pip.reconcile(&HashSet::from([SurfaceId::from("b")]), Some(&"a".into()));
        assert_eq!(pip.holder(), None);
    }

    #[tokio::test]
    async fn reconcile_drops_holder_the_browser_no_longer_shows() {
        let (host, pip) = controller();
        let ada = Participant::named("A").with_video("a");
        pip.activate(&ada).await;
        let live = HashSet::from([SurfaceId::from("a")]);

        // Closed by the user before any exit listener reported it.
        *host.showing.lock() = None;
        pip.reconcile(&live, host.showing.lock().as_ref());
        assert_eq!(pip.holder(), None);

        // The next activation asks the browser again.
        assert_eq!(pip.activate(&ada).await, Activation::Activated);
        assert_eq!(host.requests(), 2);
        pip.reconcile(&live, host.showing.lock().as_ref());
        assert_eq!(pip.holder(), Some("a".into()));
    }
}
