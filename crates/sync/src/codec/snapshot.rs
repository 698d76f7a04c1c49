use bytes::{Buf, BufMut, Bytes, BytesMut};
use glam::{EulerRot, Quat, Vec3};
use half::f16;

use super::{Channel, HeaderFlags};
use crate::config::{Axes, SyncConfig};
use crate::delta::ensure_remaining;
use crate::error::CodecError;
use crate::snapshot::{Pose, StateRecord};

const HEADER_LEN: usize = 1;
const TIMESTAMP_LEN: usize = 4;

/// Wire format for snapshot messages.
///
/// Layout: header byte, authority timestamp (`f32`), then for every channel
/// flagged in the header and in [`Channel::ALL`] order, one value per selected
/// axis as `f32` or, when the channel is compressed, as a half float.
///
/// Both peers must share axis selection and compression settings.
#[derive(Debug, Default)]
pub struct SnapshotCodec {
    last_velocity: Vec3,
    last_angular_velocity: Vec3,
}

impl SnapshotCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Velocities from the most recent message that carried them.
    pub fn last_received_velocities(&self) -> (Vec3, Vec3) {
        (self.last_velocity, self.last_angular_velocity)
    }

    pub fn reset(&mut self) {
        self.last_velocity = Vec3::ZERO;
        self.last_angular_velocity = Vec3::ZERO;
    }

    pub fn encoded_len(flags: HeaderFlags, config: &SyncConfig) -> usize {
        let payload: usize = Channel::ALL
            .iter()
            .filter(|channel| flags.contains(channel.flag()))
            .map(|&channel| {
                let settings = config.channel(channel);
                let width = if settings.compress { 2 } else { 4 };
                settings.axes.count() * width
            })
            .sum();
        HEADER_LEN + TIMESTAMP_LEN + payload
    }

    /// Encodes `record`, sending only channels in `channels` that are enabled
    /// in `config`. Rest flags are taken from the record.
    pub fn encode(record: &StateRecord, channels: HeaderFlags, config: &SyncConfig) -> Bytes {
        let mut flags = HeaderFlags::empty();
        for channel in Channel::ALL {
            if channels.contains(channel.flag()) && config.channel(channel).is_enabled() {
                flags |= channel.flag();
            }
        }
        flags.set(HeaderFlags::POSITIONAL_REST, record.at_positional_rest);
        flags.set(HeaderFlags::ROTATIONAL_REST, record.at_rotational_rest);

        let mut out = BytesMut::with_capacity(Self::encoded_len(flags, config));
        out.put_u8(flags.bits());
        out.put_f32_le(record.authority_timestamp);

        for channel in Channel::ALL {
            if !flags.contains(channel.flag()) {
                continue;
            }
            let settings = config.channel(channel);
            let value = channel_value(&record.pose, channel, settings.compress);
            put_axes(&mut out, value, settings.axes, settings.compress);
        }

        out.freeze()
    }

    /// Decodes a snapshot. Channels absent from the message take their value
    /// from `fallback`, except velocities, which repeat the last received
    /// value so extrapolation keeps working between velocity updates.
    pub fn decode(
        &mut self,
        mut data: &[u8],
        config: &SyncConfig,
        fallback: &Pose,
        received_timestamp: f32,
    ) -> Result<StateRecord, CodecError> {
        ensure_remaining(&data, HEADER_LEN + TIMESTAMP_LEN)?;
        let raw = data.get_u8();
        let flags = HeaderFlags::from_bits(raw).ok_or(CodecError::ReservedBits(raw))?;
        let authority_timestamp = data.get_f32_le();

        for channel in Channel::ALL {
            if flags.contains(channel.flag()) && !config.channel(channel).is_enabled() {
                return Err(CodecError::UnexpectedChannel(channel));
            }
        }
        let expected = Self::encoded_len(flags, config) - HEADER_LEN - TIMESTAMP_LEN;
        ensure_remaining(&data, expected)?;

        let mut pose = *fallback;
        pose.velocity = self.last_velocity;
        pose.angular_velocity = self.last_angular_velocity;

        for channel in Channel::ALL {
            if !flags.contains(channel.flag()) {
                continue;
            }
            let settings = config.channel(channel);
            let previous = channel_value(&pose, channel, settings.compress);
            let value = take_axes(&mut data, previous, settings.axes, settings.compress);
            set_channel_value(&mut pose, channel, value, settings.compress);
        }

        if data.has_remaining() {
            return Err(CodecError::TrailingBytes(data.remaining()));
        }

        if flags.contains(HeaderFlags::VELOCITY) {
            self.last_velocity = pose.velocity;
        }
        if flags.contains(HeaderFlags::ANGULAR_VELOCITY) {
            self.last_angular_velocity = pose.angular_velocity;
        }

        Ok(StateRecord {
            pose,
            authority_timestamp,
            received_timestamp,
            is_teleport: false,
            at_positional_rest: flags.contains(HeaderFlags::POSITIONAL_REST),
            at_rotational_rest: flags.contains(HeaderFlags::ROTATIONAL_REST),
        })
    }
}

/// Wire representation of a channel: angular values are degrees when sent as
/// full floats and radians when halved.
fn channel_value(pose: &Pose, channel: Channel, compressed: bool) -> Vec3 {
    let radians = match channel {
        Channel::Position => return pose.position,
        Channel::Scale => return pose.scale,
        Channel::Velocity => return pose.velocity,
        Channel::Rotation => {
            let (x, y, z) = pose.rotation.to_euler(EulerRot::XYZ);
            Vec3::new(x, y, z)
        }
        Channel::AngularVelocity => pose.angular_velocity,
    };
    if compressed {
        radians
    } else {
        radians_to_degrees(radians)
    }
}

fn set_channel_value(pose: &mut Pose, channel: Channel, value: Vec3, compressed: bool) {
    let angular = if compressed {
        value
    } else {
        degrees_to_radians(value)
    };
    match channel {
        Channel::Position => pose.position = value,
        Channel::Scale => pose.scale = value,
        Channel::Velocity => pose.velocity = value,
        Channel::Rotation => {
            pose.rotation = Quat::from_euler(EulerRot::XYZ, angular.x, angular.y, angular.z)
        }
        Channel::AngularVelocity => pose.angular_velocity = angular,
    }
}

fn put_axes(out: &mut BytesMut, value: Vec3, axes: Axes, compressed: bool) {
    for (axis, component) in Axes::ORDER.iter().zip(value.to_array()) {
        if !axes.contains(*axis) {
            continue;
        }
        if compressed {
            out.put_u16_le(f16::from_f32(component).to_bits());
        } else {
            out.put_f32_le(component);
        }
    }
}

fn take_axes(data: &mut &[u8], previous: Vec3, axes: Axes, compressed: bool) -> Vec3 {
    let mut components = previous.to_array();
    for (axis, component) in Axes::ORDER.iter().zip(components.iter_mut()) {
        if !axes.contains(*axis) {
            continue;
        }
        *component = if compressed {
            f16::from_bits(data.get_u16_le()).to_f32()
        } else {
            data.get_f32_le()
        };
    }
    Vec3::from_array(components)
}

fn radians_to_degrees(v: Vec3) -> Vec3 {
    Vec3::new(v.x.to_degrees(), v.y.to_degrees(), v.z.to_degrees())
}

fn degrees_to_radians(v: Vec3) -> Vec3 {
    Vec3::new(v.x.to_radians(), v.y.to_radians(), v.z.to_radians())
}
