use crate::{
    directory::{
        PageProbe,
        PageSnapshot,
    },
    participant::SurfaceId,
    pip::PipHost,
    visibility::Visibility,
};
use async_trait::async_trait;
use chromiumoxide::{
    cdp::{
        browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams,
        js_protocol::runtime::{
            AddBindingParams,
            EvaluateParams,
            EventBindingCalled,
        },
    },
    Page,
};
use eyre::{
    Context as _,
    Result,
};
use futures::StreamExt as _;
use meet_faces_config::PageMarkers;
use serde::de::DeserializeOwned;
use tokio::sync::{
    mpsc::{
        unbounded_channel,
        UnboundedReceiver,
    },
    watch,
};
use tokio_util::task::AbortOnDropHandle;

const PROBE: &str = include_str!("probe.js");

const VISIBILITY_BINDING: &str = "__meetFacesVisibility";
const LEFT_PIP_BINDING: &str = "__meetFacesLeftPip";

const EMPTY_SNAPSHOT: &str = "{ surfaces: [], idleContainers: [], pipSurface: null }";

/// Notifications the page pushes to us through CDP bindings.
pub(super) struct PageSignals {
    pub(super) visibility: watch::Receiver<Visibility>,
    pub(super) left_pip: UnboundedReceiver<SurfaceId>,
    pub(super) task: AbortOnDropHandle<()>,
}

/// The meeting tab, seen through the injected page probe.
#[derive(Debug, Clone)]
pub(super) struct MeetPage {
    page: Page,
}

fn probe_script(markers: &PageMarkers) -> Result<String> {
    let markers = serde_json::to_string(markers).context("failed to serialize page markers")?;
    let bindings = serde_json::json!({
        "visibility": VISIBILITY_BINDING,
        "leftPip": LEFT_PIP_BINDING,
    });
    Ok(PROBE
        .replace("__MARKERS__", &markers)
        .replace("__BINDINGS__", &bindings.to_string()))
}

fn quoted(surface: &SurfaceId) -> Result<String> {
    serde_json::to_string(surface.as_str()).context("failed to quote surface id")
}

impl MeetPage {
    /// Registers the bindings and injects the probe into the current and all
    /// future documents of the page.
    pub(super) async fn install(page: Page, markers: &PageMarkers) -> Result<(Self, PageSignals)> {
        for name in [VISIBILITY_BINDING, LEFT_PIP_BINDING] {
            page.execute(AddBindingParams::new(name))
                .await
                .with_context(|| format!("failed to add binding {name}"))?;
        }

        let mut events = page
            .event_listener::<EventBindingCalled>()
            .await
            .context("failed to listen for binding calls")?;

        let (visibility_sender, visibility) = watch::channel(Visibility::default());
        let (left_pip_sender, left_pip) = unbounded_channel();

        let task = AbortOnDropHandle::new(tokio::task::spawn(async move {
            while let Some(event) = events.next().await {
                match event.name.as_str() {
                    VISIBILITY_BINDING => match event.payload.parse::<Visibility>() {
                        Ok(value) => {
                            visibility_sender.send_replace(value);
                        }
                        Err(err) => warn!(payload = %event.payload, "Unexpected visibility report: {err}"),
                    },
                    LEFT_PIP_BINDING => {
                        if left_pip_sender.send(SurfaceId::from(event.payload.as_str())).is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            debug!("Page binding listener stopped");
        }));

        let script = probe_script(markers)?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script.clone()))
            .await
            .context("failed to register page probe")?;

        let meet = Self { page };
        meet.run(script, false).await.context("failed to install page probe")?;

        Ok((
            meet,
            PageSignals {
                visibility,
                left_pip,
                task,
            },
        ))
    }

    pub(super) async fn pip_supported(&self) -> bool {
        self.query("!!(window.__meetFaces && window.__meetFaces.pipSupported)".to_string())
            .await
            .unwrap_or_default()
    }

    fn params(expression: String, user_gesture: bool) -> Result<EvaluateParams> {
        EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .user_gesture(user_gesture)
            .build()
            .map_err(|e| eyre::eyre!("failed to build evaluation: {e}"))
    }

    async fn run(&self, expression: String, user_gesture: bool) -> Result<()> {
        self.page
            .evaluate_expression(Self::params(expression, user_gesture)?)
            .await
            .context("evaluation failed")?;
        Ok(())
    }

    async fn query<T: DeserializeOwned>(&self, expression: String) -> Result<T> {
        self.page
            .evaluate_expression(Self::params(expression, false)?)
            .await
            .context("evaluation failed")?
            .into_value::<T>()
            .context("unexpected evaluation result")
    }
}

#[async_trait]
impl PageProbe for MeetPage {
    async fn snapshot(&self) -> Result<PageSnapshot> {
        self.query(format!(
            "window.__meetFaces ? window.__meetFaces.snapshot() : {EMPTY_SNAPSHOT}"
        ))
        .await
        .context("failed to take page snapshot")
    }

    async fn tag(&self, tags: &[(SurfaceId, String)]) -> Result<()> {
        let tags = serde_json::to_string(tags).context("failed to serialize surface tags")?;
        self.run(format!("window.__meetFaces && window.__meetFaces.tag({tags})"), false)
            .await
    }
}

#[async_trait]
impl PipHost for MeetPage {
    async fn request(&self, surface: &SurfaceId) -> Result<()> {
        // The request must look like it comes from a user gesture, otherwise
        // the browser refuses it.
        self.run(format!("window.__meetFaces.request({})", quoted(surface)?), true)
            .await
            .context("picture-in-picture request failed")
    }

    async fn exit(&self) -> Result<()> {
        self.run("window.__meetFaces && window.__meetFaces.exit()".to_string(), true)
            .await
            .context("failed to exit picture-in-picture")
    }

    async fn watch_exit(&self, surface: &SurfaceId) -> Result<()> {
        self.run(format!("window.__meetFaces.watchExit({})", quoted(surface)?), false)
            .await
    }

    async fn unwatch_exit(&self, surface: &SurfaceId) -> Result<()> {
        self.run(
            format!("window.__meetFaces && window.__meetFaces.unwatchExit({})", quoted(surface)?),
            false,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_script_carries_markers_and_bindings() {
        let markers = PageMarkers {
            talking: ".speaking".to_string(),
            ..Default::default()
        };
        let script = probe_script(&markers).unwrap();

        assert!(!script.contains("__MARKERS__"));
        assert!(!script.contains("__BINDINGS__"));
        assert!(script.contains(r#""talking":".speaking""#));
        assert!(script.contains(r#""leftPip":"__meetFacesLeftPip""#));
    }

    #[test]
    fn snapshot_payload_deserializes() {
        let payload = serde_json::json!({
            "surfaces": [{
                "surfaceId": "m1-1",
                "name": null,
                "container": {
                    "streamId": "spaces/abc/devices/7",
                    "name": "Ada",
                    "talking": false,
                    "notPinned": true
                },
                "displayed": true,
                "hasEnoughData": true,
                "isSelf": false,
                "talking": true,
                "notPinned": true
            }],
            "idleContainers": [{ "streamId": null, "name": "Bob", "talking": false, "notPinned": true }],
            "pipSurface": "m1-1"
        });

        let snapshot: PageSnapshot = serde_json::from_value(payload).unwrap();
        assert_eq!(snapshot.pip_surface, Some(SurfaceId::from("m1-1")));
        let participants = crate::directory::build(&snapshot, None);
        assert_eq!(participants.len(), 2);
        assert!(participants[0].is_talking);
        assert_eq!(participants[1].name, "Bob");
    }

    #[test]
    fn surface_ids_are_quoted_for_scripts() {
        assert_eq!(quoted(&SurfaceId::from(r#"a"b"#)).unwrap(), r#""a\"b""#);
    }
}
