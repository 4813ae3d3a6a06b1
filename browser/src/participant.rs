use base64::{
    engine::general_purpose::URL_SAFE_NO_PAD,
    Engine as _,
};
use derive_more::{
    Display,
    From,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Identity of one video element, stamped onto it by the page probe.
///
/// It is only a key: holding one never keeps the element alive, and it stops
/// matching anything once the element leaves the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(String);

impl From<&str> for SurfaceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl SurfaceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A video surface as attributed to a participant during one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surface {
    pub id: SurfaceId,
    /// Not hidden by the page layout.
    pub displayed: bool,
    /// Buffered enough data to render a frame.
    pub has_enough_data: bool,
}

impl Surface {
    pub fn is_rendering(&self) -> bool {
        self.displayed && self.has_enough_data
    }
}

/// One meeting attendee as seen by a single directory scan. Nothing survives
/// between scans except [`Participant::id`], which is derived from the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub is_you: bool,
    pub is_talking: bool,
    pub available: bool,
    pub is_pinned: bool,
    /// One of the surfaces currently holds picture-in-picture.
    pub active: bool,
    pub surfaces: Vec<Surface>,
}

impl Participant {
    /// URL safe base64 of the display name. Participants sharing a display
    /// name share an id.
    pub fn id_for_name(name: &str) -> String {
        URL_SAFE_NO_PAD.encode(name)
    }

    /// The surface picture-in-picture should be requested for.
    pub fn eligible_surface(&self) -> Option<&Surface> {
        self.surfaces.iter().find(|surface| surface.displayed)
    }
}

#[cfg(test)]
impl Participant {
    /// A remote, silent, unpinned participant without video.
    pub(crate) fn named(name: &str) -> Self {
        Self {
            id: Self::id_for_name(name),
            name: name.to_string(),
            is_you: false,
            is_talking: false,
            available: false,
            is_pinned: false,
            active: false,
            surfaces: Vec::new(),
        }
    }

    pub(crate) fn you(mut self) -> Self {
        self.is_you = true;
        self
    }

    pub(crate) fn talking(mut self) -> Self {
        self.is_talking = true;
        self
    }

    pub(crate) fn pinned(mut self) -> Self {
        self.is_pinned = true;
        self
    }

    /// Marks the participant available with one rendering surface.
    pub(crate) fn with_video(mut self, surface: &str) -> Self {
        self.available = true;
        self.surfaces.push(Surface {
            id: surface.into(),
            displayed: true,
            has_enough_data: true,
        });
        self
    }
}
