mod clock;
mod interpolation;
mod registry;
mod rest;
mod smoothing;
mod transform_sync;

pub use clock::{CLOCK_FLOOR_EXPONENT, ClockAdjustment, ClockReconciler};
pub use interpolation::{
    Evaluation, InstantChannels, Interpolator, MotionParams, Outcome, Target, blend,
    channel_distance, project, slerp_shortest,
};
pub use registry::{EntityId, SyncRegistry};
pub use rest::{RestTracker, RestTransition};
pub use smoothing::{apply_target, freeze};
pub use transform_sync::{SyncStats, TransformSync};
