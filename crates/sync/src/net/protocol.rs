use bytes::Bytes;
use glam::{Quat, Vec3};
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::authority::PeerId;
use crate::error::ControlError;
use crate::snapshot::Pose;

/// Logical stream a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// Snapshot messages; may be lost or reordered.
    State,
    /// Teleports and ownership changes.
    Control,
}

impl ChannelId {
    pub fn delivery(self) -> DeliveryMode {
        match self {
            ChannelId::State => DeliveryMode::Unreliable,
            ChannelId::Control => DeliveryMode::Reliable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    Unreliable,
    Reliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipients {
    /// Every peer except the sender.
    Observers,
    /// Relay through the server to the other clients.
    Server,
}

/// A payload waiting for the host transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub channel: ChannelId,
    pub delivery: DeliveryMode,
    pub recipients: Recipients,
    pub payload: Bytes,
}

impl Outgoing {
    pub fn new(channel: ChannelId, recipients: Recipients, payload: Bytes) -> Self {
        Self {
            channel,
            delivery: channel.delivery(),
            recipients,
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WirePose {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
}

impl From<Pose> for WirePose {
    fn from(pose: Pose) -> Self {
        Self {
            position: pose.position.to_array(),
            rotation: pose.rotation.to_array(),
            scale: pose.scale.to_array(),
            velocity: pose.velocity.to_array(),
            angular_velocity: pose.angular_velocity.to_array(),
        }
    }
}

impl From<WirePose> for Pose {
    fn from(wire: WirePose) -> Self {
        Self {
            position: Vec3::from_array(wire.position),
            rotation: Quat::from_array(wire.rotation).normalize(),
            scale: Vec3::from_array(wire.scale),
            velocity: Vec3::from_array(wire.velocity),
            angular_velocity: Vec3::from_array(wire.angular_velocity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ControlMessage {
    Teleport {
        pose: WirePose,
        timestamp: f32,
    },
    OwnershipTransfer {
        new_owner: Option<PeerId>,
        pose: WirePose,
    },
}

impl ControlMessage {
    pub fn teleport(pose: Pose, timestamp: f32) -> Self {
        ControlMessage::Teleport {
            pose: pose.into(),
            timestamp,
        }
    }

    pub fn ownership_transfer(new_owner: Option<PeerId>, pose: Pose) -> Self {
        ControlMessage::OwnershipTransfer {
            new_owner,
            pose: pose.into(),
        }
    }

    pub fn serialize(&self) -> Result<Bytes, ControlError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| Bytes::from(aligned.into_vec()))
            .map_err(ControlError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, ControlError> {
        // Payloads may arrive at any offset; archived data needs alignment.
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(ControlError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_message_serialization() {
        let pose = Pose {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(0.5),
            ..Default::default()
        };
        let message = ControlMessage::ownership_transfer(Some(4), pose);

        let bytes = message.serialize().unwrap();
        let decoded = ControlMessage::deserialize(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn unaligned_payload_is_accepted() {
        let message = ControlMessage::teleport(Pose::default(), 2.5);
        let bytes = message.serialize().unwrap();

        let mut shifted = vec![0u8];
        shifted.extend_from_slice(&bytes);
        let decoded = ControlMessage::deserialize(&shifted[1..]).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ControlMessage::deserialize(&[0xff; 3]).is_err());
    }

    #[test]
    fn channels_pick_delivery() {
        assert_eq!(ChannelId::State.delivery(), DeliveryMode::Unreliable);
        assert_eq!(ChannelId::Control.delivery(), DeliveryMode::Reliable);
    }
}
