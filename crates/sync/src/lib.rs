pub mod authority;
pub mod codec;
pub mod config;
pub mod delta;
pub mod engine;
pub mod error;
pub mod event;
pub mod net;
pub mod physics;
pub mod snapshot;

pub use authority::{AuthorityGate, AuthorityMode, AuthorityState, LocalRole, PeerId};
pub use codec::{Channel, HeaderFlags, SnapshotCodec};
pub use config::{
    Axes, ChannelSettings, ExtrapolationLimits, ExtrapolationMode, SyncConfig, TickSource,
};
pub use delta::{Delta, DeltaPair, DeltaValue};
pub use engine::{
    ClockReconciler, EntityId, Evaluation, Interpolator, Outcome, SyncRegistry, SyncStats,
    TransformSync,
};
pub use error::{CodecError, ConfigError, ControlError, SyncError};
pub use event::SyncEvent;
pub use net::{ChannelId, ControlMessage, DeliveryMode, Outgoing, Recipients, Transport};
pub use physics::{PhysicalBody, PhysicsWorld, RapierBody, TransformBody};
pub use snapshot::{Pose, SnapshotHistory, StateRecord};
