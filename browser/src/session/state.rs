use crate::participant::SurfaceId;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub running: bool,
    pub hidden: bool,
    /// Surface currently floated in picture-in-picture.
    pub showing: Option<SurfaceId>,
}
