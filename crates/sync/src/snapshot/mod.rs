mod history;
mod record;

pub use history::SnapshotHistory;
pub use record::{Pose, StateRecord};
