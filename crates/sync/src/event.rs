use crate::engine::Outcome;
use crate::net::ChannelId;
use crate::snapshot::Pose;

/// Things that happened inside a synchronizer since the last drain.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// An observer wrote a new state to its body.
    StateApplied { pose: Pose, outcome: Outcome },
    /// Prediction gave up; the body was stopped.
    ExtrapolationFailed,
    /// A payload could not be used.
    MessageDiscarded { channel: ChannelId, reason: String },
    AuthorityChanged { has_control: bool },
    Teleported { pose: Pose },
}
