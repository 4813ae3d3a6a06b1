use super::{
    messages::SessionMessage,
    page::MeetPage,
    SessionState,
};
use crate::{
    create_browser,
    faces::Faces,
    participant::SurfaceId,
};
use chromiumoxide::{
    cdp::browser_protocol::target::{
        CreateTargetParams,
        EventTargetDestroyed,
    },
    Browser,
    Page,
};
use eyre::{
    bail,
    Context as _,
    Result,
};
use futures::{
    Stream,
    StreamExt as _,
};
use meet_faces_config::{
    BrowserConfig,
    PageMarkers,
    SettingsStore,
};
use std::{
    fmt,
    sync::Arc,
};
use tokio::sync::{
    mpsc::UnboundedReceiver,
    watch,
};
use tokio_util::task::AbortOnDropHandle;
use url::Url;

/// Async worker that owns the browser and the meeting tab.
///
/// Page notifications and handle messages are funneled into one loop, so the
/// coordinator only ever sees one event at a time.
pub(super) struct SessionInner {
    browser: Browser,
    launched: bool,
    page: Page,
    faces: Faces,
    state: watch::Sender<SessionState>,
}

impl SessionInner {
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub(super) async fn run(
        url: Url,
        browser_config: BrowserConfig,
        markers: PageMarkers,
        store: Arc<dyn SettingsStore>,
        receiver: UnboundedReceiver<SessionMessage>,
        state: watch::Sender<SessionState>,
    ) -> Result<()> {
        let (mut browser, handler) = create_browser(&browser_config).await?;
        // Both background tasks end with this function, early returns included.
        let _browser_events = Self::drive_browser_events(handler);

        let page = Self::open_meeting(&mut browser, &url).await?;
        let (meet, signals) = MeetPage::install(page.clone(), &markers).await?;
        let supported = meet.pip_supported().await;
        if !supported {
            warn!("Picture-in-picture is not available in this browser, faces stay inactive");
        }

        let _page_bindings = signals.task;

        let meet = Arc::new(meet);
        let faces = Faces::new(store, meet.clone(), meet, signals.visibility);

        let session = Self {
            browser,
            launched: browser_config.connect.is_none(),
            page,
            faces,
            state,
        };

        session
            .handle_events(supported, signals.left_pip, receiver)
            .await
            .context("failed to handle session events")
    }

    fn drive_browser_events<H, E>(mut handler: H) -> AbortOnDropHandle<()>
    where
        H: Stream<Item = Result<(), E>> + Unpin + Send + 'static,
        E: fmt::Debug + fmt::Display + Send + 'static,
    {
        AbortOnDropHandle::new(tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    if err.to_string().contains("ResetWithoutClosingHandshake") {
                        error!("Browser unexpectedly closed");
                        break;
                    }
                    error!("error in browser handler: {err:?}");
                }
            }
            debug!("Browser event handler stopped");
        }))
    }

    /// Reuses a tab already showing the meeting when attached to a running
    /// browser, otherwise opens a new one.
    async fn open_meeting(browser: &mut Browser, url: &Url) -> Result<Page> {
        for page in browser.pages().await.context("failed to get pages")? {
            if let Ok(Some(current)) = page.url().await {
                if current.starts_with(url.as_str()) {
                    debug!(%current, "Found an open meeting tab");
                    return Ok(page);
                }
            }
        }

        let page = browser
            .new_page(
                CreateTargetParams::builder()
                    .url(url.to_string())
                    .build()
                    .map_err(|e| eyre::eyre!(e))?,
            )
            .await
            .context("failed to create new page")?;

        if let Some(navigation) = page
            .wait_for_navigation_response()
            .await
            .context("Page could not navigate to the meeting")?
        {
            if let Some(text) = &navigation.failure_text {
                bail!("Opening {url} failed: {text}");
            }
        }

        debug!("Opened a new page for {url}");

        Ok(page)
    }

    async fn handle_events(
        self,
        supported: bool,
        mut left_pip: UnboundedReceiver<SurfaceId>,
        mut receiver: UnboundedReceiver<SessionMessage>,
    ) -> Result<()> {
        let mut visibility = self.faces.visibility().events();
        let mut showing = self.faces.pip().subscribe();
        let mut destroyed = self
            .browser
            .event_listener::<EventTargetDestroyed>()
            .await
            .context("failed to create event listener")?;

        self.state.send_modify(|state| {
            state.running = true;
            state.hidden = self.faces.visibility().is_hidden();
        });

        if supported && self.faces.visibility().is_hidden() {
            self.faces.on_hidden().await;
        }

        loop {
            tokio::select! {
                biased;

                Some(event) = destroyed.next() => {
                    if event.target_id == *self.page.target_id() {
                        warn!("Meeting tab was closed");
                        break;
                    }
                }

                Some(event) = visibility.recv() => {
                    self.state.send_if_modified(|state| {
                        let hidden = self.faces.visibility().is_hidden();
                        std::mem::replace(&mut state.hidden, hidden) != hidden
                    });
                    if supported {
                        self.faces.handle_visibility(event).await;
                    }
                }

                Some(surface) = left_pip.recv() => {
                    if self.faces.pip().on_exit(&surface).await {
                        debug!(%surface, "Picture-in-picture closed from outside");
                    }
                }

                Ok(()) = showing.changed() => {
                    let holder = showing.borrow_and_update().holder().cloned();
                    self.state.send_if_modified(|state| {
                        std::mem::replace(&mut state.showing, holder.clone()) != holder
                    });
                }

                Some(message) = receiver.recv() => {
                    debug!(%message, "Session message");
                    match message {
                        SessionMessage::SettingsChanged => {
                            self.faces.settings_changed().await;
                        }
                        SessionMessage::Participants(reply) => {
                            let _ = reply.send(self.faces.participants().await);
                        }
                        SessionMessage::Close => break,
                    }
                }

                else => break,
            }
        }

        self.close().await;

        Ok(())
    }

    async fn close(mut self) {
        self.faces.on_shown().await;

        if self.launched {
            match self.browser.close().await {
                Ok(_) => {
                    if let Err(err) = self.browser.wait().await {
                        error!("failed to wait for browser: {err}");
                    }
                    debug!("Browser closed");
                }
                Err(err) => error!("failed to close browser: {err}"),
            }
        } else {
            debug!("Detached from the browser");
        }

        self.state.send_modify(|state| {
            state.running = false;
            state.showing = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn browser_events_stop_with_their_handle() {
        let (events, handler) = futures::channel::mpsc::unbounded::<Result<(), String>>();
        let driver = SessionInner::drive_browser_events(handler);

        events.unbounded_send(Err("websocket hiccup".to_string())).unwrap();
        settle().await;
        assert!(!events.is_closed(), "handler keeps going after an error");

        drop(driver);
        settle().await;
        assert!(events.is_closed());
    }
}
