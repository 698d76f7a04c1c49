mod protocol;
mod transport;

pub use protocol::{
    ArchivedControlMessage, ChannelId, ControlMessage, DeliveryMode, Outgoing, Recipients,
    WirePose,
};
pub use transport::Transport;
