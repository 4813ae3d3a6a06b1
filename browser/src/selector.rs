use crate::participant::Participant;
use meet_faces_config::Settings;

/// Picks the participant to float, first match wins:
///
/// 1. the local user is left out unless `include_you` is set or nobody else is there
/// 2. somebody remote who is talking and has video
/// 3. somebody remote with video who isn't pinned (pinned tiles are already on screen)
/// 4. somebody remote with video
/// 5. whoever comes first
pub fn select<'a>(participants: &'a [Participant], settings: &Settings) -> Option<&'a Participant> {
    let exclude_you = !settings.include_you && participants.iter().any(|p| !p.is_you);
    let candidates = || participants.iter().filter(move |p| !(exclude_you && p.is_you));
    let remote_with_video = |p: &&Participant| p.available && !p.is_you;

    candidates()
        .filter(remote_with_video)
        .find(|p| p.is_talking)
        .or_else(|| candidates().filter(remote_with_video).find(|p| !p.is_pinned))
        .or_else(|| candidates().find(remote_with_video))
        .or_else(|| candidates().next())
}
