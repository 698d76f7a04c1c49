use glam::{Quat, Vec3};

use crate::physics::PhysicalBody;

/// Transform and motion of an entity, without timing information.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub velocity: Vec3,
    /// Radians per second.
    pub angular_velocity: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

impl Pose {
    pub fn from_body<B: PhysicalBody + ?Sized>(body: &B) -> Self {
        Self {
            position: body.position(),
            rotation: body.rotation(),
            scale: body.scale(),
            velocity: body.velocity(),
            angular_velocity: body.angular_velocity(),
        }
    }

    pub fn at_rest(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            ..Self::default()
        }
    }
}

/// One received or synthesized snapshot of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateRecord {
    pub pose: Pose,
    /// Sender clock when the state was sampled.
    pub authority_timestamp: f32,
    /// Local clock when the record arrived.
    pub received_timestamp: f32,
    pub is_teleport: bool,
    pub at_positional_rest: bool,
    pub at_rotational_rest: bool,
}

impl StateRecord {
    pub fn new(pose: Pose, authority_timestamp: f32) -> Self {
        Self {
            pose,
            authority_timestamp,
            ..Self::default()
        }
    }

    pub fn teleport(pose: Pose, authority_timestamp: f32, received_timestamp: f32) -> Self {
        Self {
            pose,
            authority_timestamp,
            received_timestamp,
            is_teleport: true,
            at_positional_rest: true,
            at_rotational_rest: true,
        }
    }

    pub fn at_rest(&self) -> bool {
        self.at_positional_rest && self.at_rotational_rest
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.pose.rotation
    }
}
