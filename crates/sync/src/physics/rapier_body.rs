use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};
use rapier3d::dynamics::RigidBodyHandle;

use super::{PhysicalBody, PhysicsWorld};

/// A rapier rigid body seen through [`PhysicalBody`].
///
/// The world is shared with the host, which keeps stepping it. Rigid bodies
/// have no scale, so scale is held here.
pub struct RapierBody {
    physics: Rc<RefCell<PhysicsWorld>>,
    handle: RigidBodyHandle,
    scale: Vec3,
}

impl RapierBody {
    pub fn new(physics: Rc<RefCell<PhysicsWorld>>, handle: RigidBodyHandle) -> Self {
        Self {
            physics,
            handle,
            scale: Vec3::ONE,
        }
    }

    pub fn handle(&self) -> RigidBodyHandle {
        self.handle
    }
}

impl PhysicalBody for RapierBody {
    fn position(&self) -> Vec3 {
        self.physics
            .borrow()
            .body_position(self.handle)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_position(&mut self, position: Vec3) {
        self.physics
            .borrow_mut()
            .set_body_position(self.handle, position);
    }

    fn rotation(&self) -> Quat {
        self.physics
            .borrow()
            .body_rotation(self.handle)
            .unwrap_or(Quat::IDENTITY)
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.physics
            .borrow_mut()
            .set_body_rotation(self.handle, rotation);
    }

    fn scale(&self) -> Vec3 {
        self.scale
    }

    fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    fn velocity(&self) -> Vec3 {
        self.physics
            .borrow()
            .body_velocity(self.handle)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.physics
            .borrow_mut()
            .set_body_velocity(self.handle, velocity);
    }

    fn angular_velocity(&self) -> Vec3 {
        self.physics
            .borrow()
            .body_angular_velocity(self.handle)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        self.physics
            .borrow_mut()
            .set_body_angular_velocity(self.handle, angular_velocity);
    }

    fn drag(&self) -> f32 {
        self.physics
            .borrow()
            .body(self.handle)
            .map_or(0.0, |b| b.linear_damping())
    }

    fn angular_drag(&self) -> f32 {
        self.physics
            .borrow()
            .body(self.handle)
            .map_or(0.0, |b| b.angular_damping())
    }

    fn gravity_scale(&self) -> f32 {
        self.physics
            .borrow()
            .body(self.handle)
            .map_or(0.0, |b| b.gravity_scale())
    }
}
