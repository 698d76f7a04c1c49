mod header;
mod snapshot;

pub use header::{Channel, HeaderFlags};
pub use snapshot::SnapshotCodec;
