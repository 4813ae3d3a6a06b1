use serde::{
    Deserialize,
    Serialize,
};
use strum::{
    Display,
    EnumString,
};
use tokio::sync::{
    mpsc::{
        unbounded_channel,
        UnboundedReceiver,
    },
    watch,
};

/// Visibility of the meeting document as last reported by the page.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    /// The page has no visibility API. Nothing is ever reported.
    #[default]
    Unsupported,
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum VisibilityEvent {
    Hidden,
    Shown,
}

/// Turns the raw visibility signal into one event per transition.
#[derive(Debug, Clone)]
pub struct VisibilityMonitor {
    signal: watch::Receiver<Visibility>,
}

impl VisibilityMonitor {
    pub fn new(signal: watch::Receiver<Visibility>) -> Self {
        Self { signal }
    }

    pub fn is_hidden(&self) -> bool {
        *self.signal.borrow() == Visibility::Hidden
    }

    /// Spawns the edge detector. The channel closes once the signal's sender
    /// is gone.
    pub fn events(&self) -> UnboundedReceiver<VisibilityEvent> {
        let (sender, receiver) = unbounded_channel();
        let mut signal = self.signal.clone();

        tokio::spawn(async move {
            let mut last = *signal.borrow_and_update();
            while signal.changed().await.is_ok() {
                let current = *signal.borrow_and_update();
                let event = match (last, current) {
                    (Visibility::Hidden, Visibility::Hidden) => None,
                    (_, Visibility::Hidden) => Some(VisibilityEvent::Hidden),
                    (Visibility::Hidden, Visibility::Visible) => Some(VisibilityEvent::Shown),
                    _ => None,
                };
                last = current;

                if let Some(event) = event {
                    debug!(%event, "Visibility changed");
                    if sender.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn drain(receiver: &mut UnboundedReceiver<VisibilityEvent>) -> Vec<VisibilityEvent> {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn fires_once_per_transition() {
        let (signal, receiver) = watch::channel(Visibility::Visible);
        let monitor = VisibilityMonitor::new(receiver);
        let mut events = monitor.events();
        assert!(drain(&mut events).await.is_empty());

        signal.send_replace(Visibility::Hidden);
        assert_eq!(drain(&mut events).await, [VisibilityEvent::Hidden]);
        assert!(monitor.is_hidden());

        // Repeated reports of the same state are not transitions.
        signal.send_replace(Visibility::Hidden);
        assert!(drain(&mut events).await.is_empty());

        signal.send_replace(Visibility::Visible);
        assert_eq!(drain(&mut events).await, [VisibilityEvent::Shown]);
        assert!(!monitor.is_hidden());
    }

    #[tokio::test]
    async fn unsupported_never_fires() {
        let (signal, receiver) = watch::channel(Visibility::Unsupported);
        let monitor = VisibilityMonitor::new(receiver);
        let mut events = monitor.events();

        signal.send_replace(Visibility::Unsupported);
        assert!(drain(&mut events).await.is_empty());
        assert!(!monitor.is_hidden());

        drop(signal);
        assert_eq!(events.recv().await, None);
    }

    #[test]
    fn parses_page_reports() {
        assert_eq!("hidden".parse::<Visibility>().unwrap(), Visibility::Hidden);
        assert_eq!("visible".parse::<Visibility>().unwrap(), Visibility::Visible);
        assert_eq!("unsupported".parse::<Visibility>().unwrap(), Visibility::Unsupported);
    }
}
