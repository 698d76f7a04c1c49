use rkyv::rancor;

use crate::codec::Channel;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("{0:?} channel present on the wire but not enabled locally")]
    UnexpectedChannel(Channel),
    #[error("header has reserved bits set: {0:#010b}")]
    ReservedBits(u8),
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
    #[error("delta mask {mask:#06x} references fields beyond arity {arity}")]
    MaskOutOfRange { mask: u16, arity: usize },
    #[error("invalid boolean byte {0}")]
    InvalidBool(u8),
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control message serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("control message deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("send rate must be positive, got {0}")]
    SendRate(f32),
    #[error("interpolation delay must not be negative, got {0}")]
    InterpolationDelay(f32),
    #[error("{name} must lie in [0, 1], got {value}")]
    LerpRate { name: &'static str, value: f32 },
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f32 },
    #[error("rest tick count must be at least 1")]
    RestTickCount,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{operation} requires authority over the entity")]
    NotAuthority { operation: &'static str },
    #[error("no synchronized entity with id {0}")]
    UnknownEntity(u32),
}
