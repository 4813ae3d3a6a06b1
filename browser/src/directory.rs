//! Turns the raw page snapshot into the participant directory.
//!
//! The page probe reports facts about every video element and participant
//! tile; grouping, keying and attribute derivation happen here so they can be
//! tested without a browser.

use crate::{
    participant::{
        Participant,
        Surface,
        SurfaceId,
    },
    pip::PipController,
};
use async_trait::async_trait;
use eyre::Result;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::Arc,
};

/// Facts about a participant tile of the host page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerNode {
    pub stream_id: Option<String>,
    pub name: Option<String>,
    /// The tile contains the talking marker.
    pub talking: bool,
    /// The tile matches the not-pinned marker.
    pub not_pinned: bool,
}

/// Facts about one video element of the host page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceNode {
    pub surface_id: SurfaceId,
    /// Name found through the fallback parent hops, if any.
    #[serde(default)]
    pub name: Option<String>,
    /// Closest ancestor matching the participant marker.
    #[serde(default)]
    pub container: Option<ContainerNode>,
    pub displayed: bool,
    pub has_enough_data: bool,
    pub is_self: bool,
    /// An ancestor of the element matches the talking marker.
    #[serde(default)]
    pub talking: bool,
    /// An ancestor of the element matches the not-pinned marker.
    #[serde(default)]
    pub not_pinned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSnapshot {
    pub surfaces: Vec<SurfaceNode>,
    /// Participant tiles that contain no video element at all.
    pub idle_containers: Vec<ContainerNode>,
    /// Surface the browser currently shows in picture-in-picture.
    pub pip_surface: Option<SurfaceId>,
}

impl PageSnapshot {
    pub fn surface_ids(&self) -> HashSet<SurfaceId> {
        self.surfaces.iter().map(|node| node.surface_id.clone()).collect()
    }
}

/// Access to the host page. Everything specific to the page markup lives
/// behind this trait.
#[async_trait]
pub trait PageProbe: Send + Sync {
    async fn snapshot(&self) -> Result<PageSnapshot>;

    /// Writes the participant id onto the given surfaces. Purely a hint for
    /// later lookups.
    async fn tag(&self, _tags: &[(SurfaceId, String)]) -> Result<()> {
        Ok(())
    }
}

/// How surfaces are grouped into participants. A stream id wins over the
/// display name whenever the tile exposes one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SourceKey {
    Stream(String),
    Name(String),
}

impl SourceKey {
    fn of(container: Option<&ContainerNode>, name: &str) -> Self {
        match container.and_then(|c| c.stream_id.as_deref()).filter(|id| !id.is_empty()) {
            Some(stream_id) => SourceKey::Stream(stream_id.to_string()),
            None => SourceKey::Name(name.to_string()),
        }
    }
}

struct Group<'a> {
    name: String,
    nodes: Vec<&'a SurfaceNode>,
}

fn display_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim).filter(|name| !name.is_empty()).map(str::to_string)
}

/// Builds the ordered participant list from one snapshot.
///
/// Order follows the first surface of every group, then tiles without video.
/// Surfaces that can't be attributed to a name are dropped.
pub fn build(snapshot: &PageSnapshot, pip_holder: Option<&SurfaceId>) -> Vec<Participant> {
    let mut order = Vec::<SourceKey>::new();
    let mut groups = HashMap::<SourceKey, Group<'_>>::new();
    let mut keys = Keys::default();

    for node in &snapshot.surfaces {
        let container_name = node.container.as_ref().and_then(|c| c.name.as_deref());
        let Some(name) = display_name(container_name).or_else(|| display_name(node.name.as_deref())) else {
            trace!(surface = %node.surface_id, "Dropping surface without participant");
            continue;
        };

        let key = keys.resolve(SourceKey::of(node.container.as_ref(), &name), &name);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Group {
                    name,
                    nodes: Vec::new(),
                }
            })
            .nodes
            .push(node);
    }

    let mut participants = order
        .iter()
        .filter_map(|key| groups.remove(key))
        .map(|group| from_group(group, pip_holder))
        .collect::<Vec<_>>();
    let mut seen = order.into_iter().collect::<HashSet<_>>();

    for container in &snapshot.idle_containers {
        let Some(name) = display_name(container.name.as_deref()) else {
            continue;
        };
        if !seen.insert(keys.resolve(SourceKey::of(Some(container), &name), &name)) {
            continue;
        }
        participants.push(Participant {
            id: Participant::id_for_name(&name),
            name,
            is_you: false,
            is_talking: container.talking,
            available: false,
            is_pinned: !container.not_pinned,
            active: false,
            surfaces: Vec::new(),
        });
    }

    participants
}

/// Maps surfaces and tiles of one person onto a single group.
///
/// A name key joins the first group with that name. A stream key joins a
/// group only known by that name, once; any further stream id with the same
/// name is a different person.
#[derive(Default)]
struct Keys {
    by_name: HashMap<String, SourceKey>,
    aliases: HashMap<SourceKey, SourceKey>,
}

impl Keys {
    fn resolve(&mut self, key: SourceKey, name: &str) -> SourceKey {
        if let Some(alias) = self.aliases.get(&key) {
            return alias.clone();
        }

        let resolved = match (&key, self.by_name.get(name)) {
            (SourceKey::Name(_), Some(existing)) => existing.clone(),
            (SourceKey::Stream(_), Some(existing @ SourceKey::Name(_)))
                if !self.aliases.values().any(|adopted| adopted == existing) =>
            {
                existing.clone()
            }
            _ => key.clone(),
        };

        if resolved != key {
            if let SourceKey::Stream(_) = key {
                self.aliases.insert(key, resolved.clone());
            }
        }
        self.by_name.entry(name.to_string()).or_insert_with(|| resolved.clone());
        resolved
    }
}

fn from_group(group: Group<'_>, pip_holder: Option<&SurfaceId>) -> Participant {
    let Group { name, nodes } = group;
    let containers = || nodes.iter().filter_map(|node| node.container.as_ref());

    let surfaces = nodes
        .iter()
        .map(|node| Surface {
            id: node.surface_id.clone(),
            displayed: node.displayed,
            has_enough_data: node.has_enough_data,
        })
        .collect::<Vec<_>>();

    let is_talking = nodes.iter().any(|node| node.talking) || containers().any(|c| c.talking);
    // Pinned unless either the tile or any of the videos says otherwise.
    let is_pinned = !nodes.iter().any(|node| node.not_pinned) && !containers().any(|c| c.not_pinned);

    Participant {
        id: Participant::id_for_name(&name),
        name,
        is_you: nodes.iter().any(|node| node.is_self),
        is_talking,
        available: surfaces.iter().any(Surface::is_rendering),
        is_pinned,
        active: pip_holder.is_some_and(|holder| surfaces.iter().any(|s| &s.id == holder)),
        surfaces,
    }
}

/// Scans the page through a [`PageProbe`], keeping the picture-in-picture
/// bookkeeping in line with the surfaces that still exist.
#[derive(Clone)]
pub struct Directory {
    probe: Arc<dyn PageProbe>,
    pip: PipController,
}

impl Directory {
    pub fn new(probe: Arc<dyn PageProbe>, pip: PipController) -> Self {
        Self { probe, pip }
    }

    pub async fn scan(&self) -> Result<Vec<Participant>> {
        let snapshot = self.probe.snapshot().await?;
        self.pip.reconcile(&snapshot.surface_ids(), snapshot.pip_surface.as_ref());

        let participants = build(&snapshot, self.pip.holder().as_ref());

        let tags = participants
            .iter()
            .flat_map(|p| p.surfaces.iter().map(|s| (s.id.clone(), p.id.clone())))
            .collect::<Vec<_>>();
        if let Err(err) = self.probe.tag(&tags).await {
            debug!("Failed to tag surfaces: {err}");
        }

        Ok(participants)
    }
}
