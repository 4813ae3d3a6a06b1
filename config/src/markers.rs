use serde::{
    Deserialize,
    Serialize,
};

/// Structural and class-name conventions of the meeting page.
///
/// The host markup is an unstable, third-party contract. Everything the page
/// probe needs to know about it is collected here so a markup change only
/// touches this value (or the `markers` section of the config file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMarkers {
    /// Selector of the element wrapping one participant tile.
    pub participant: String,
    /// Attribute on the participant element carrying the stream identifier.
    pub stream_id_attribute: String,
    /// Selector of the element whose text is the display name.
    pub name: String,
    /// Selector of the active speaker indicator.
    pub talking: String,
    /// Selector matching tiles that are *not* pinned by the local user.
    pub not_pinned: String,
    /// Selector matching the local user's own video.
    pub self_video: String,
    /// Parent hops from a video to the element holding its name when no
    /// participant element is found.
    pub fallback_hops: u8,
}

impl Default for PageMarkers {
    fn default() -> Self {
        Self {
            participant: "div[data-requested-participant-id]".to_string(),
            stream_id_attribute: "data-participant-id".to_string(),
            name: "[data-self-name]".to_string(),
            talking: ".kssMZb".to_string(),
            not_pinned: ".PoIECb".to_string(),
            self_video: ".Gv1mTb-PVLJEc".to_string(),
            fallback_hops: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let markers: PageMarkers = serde_yml::from_str("talking: .speaking\nfallback_hops: 3\n").unwrap();
        assert_eq!(
            markers,
            PageMarkers {
                talking: ".speaking".to_string(),
                fallback_hops: 3,
                ..Default::default()
            }
        );
    }
}
