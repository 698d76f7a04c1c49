use glam::{Quat, Vec3};
use rapier3d::prelude::*;

/// Minimal rapier world used to host synchronized rigid bodies.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0), 1.0 / 60.0)
    }
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3, dt: f32) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = dt;
        integration_parameters.min_ccd_dt = dt / 100.0;

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(gravity.x, gravity.y, gravity.z),
        }
    }

    pub fn step(&mut self) {
        self.pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    pub fn add_dynamic_sphere(
        &mut self,
        position: Vec3,
        radius: f32,
        mass: f32,
        linear_damping: f32,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(position.x, position.y, position.z))
            .linear_damping(linear_damping)
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::ball(radius)
            .mass(mass)
            .friction(0.5)
            .restitution(0.3)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// A body moved only by the synchronizer, never by the solver.
    pub fn add_kinematic(&mut self, position: Vec3) -> RigidBodyHandle {
        let body = RigidBodyBuilder::kinematic_velocity_based()
            .translation(Vector::new(position.x, position.y, position.z))
            .build();
        self.bodies.insert(body)
    }

    pub fn add_ground(&mut self, y: Real, half_size: Real) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_size, 0.1, half_size)
            .translation(Vector::new(0.0, y, 0.0))
            .build();
        self.colliders.insert(collider)
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_position(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| {
            let t = b.translation();
            Vec3::new(t.x, t.y, t.z)
        })
    }

    pub fn set_body_position(&mut self, handle: RigidBodyHandle, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            let current_rot = *body.rotation();
            let new_pose =
                Pose::from_parts(Vector::new(position.x, position.y, position.z), current_rot);
            body.set_position(new_pose, true);
        }
    }

    pub fn body_rotation(&self, handle: RigidBodyHandle) -> Option<Quat> {
        self.bodies.get(handle).map(|b| {
            let r = b.rotation();
            Quat::from_xyzw(r.x, r.y, r.z, r.w)
        })
    }

    pub fn set_body_rotation(&mut self, handle: RigidBodyHandle, rotation: Quat) {
        if let Some(body) = self.bodies.get_mut(handle) {
            let t = body.translation();
            let t = Vector::new(t.x, t.y, t.z);
            let rot =
                Rotation::from_xyzw(rotation.x, rotation.y, rotation.z, rotation.w).normalize();
            body.set_position(Pose::from_parts(t, rot), true);
        }
    }

    pub fn body_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| {
            let v = b.linvel();
            Vec3::new(v.x, v.y, v.z)
        })
    }

    pub fn set_body_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(Vector::new(velocity.x, velocity.y, velocity.z), true);
        }
    }

    pub fn body_angular_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| {
            let w = b.angvel();
            Vec3::new(w.x, w.y, w.z)
        })
    }

    pub fn set_body_angular_velocity(&mut self, handle: RigidBodyHandle, angular_velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_angvel(
                Vector::new(angular_velocity.x, angular_velocity.y, angular_velocity.z),
                true,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_body_falls() {
        let mut physics = PhysicsWorld::default();
        let handle = physics.add_dynamic_sphere(Vec3::new(0.0, 10.0, 0.0), 0.5, 1.0, 0.0);

        for _ in 0..30 {
            physics.step();
        }

        let position = physics.body_position(handle).unwrap();
        assert!(position.y < 10.0);
        assert!(physics.body_velocity(handle).unwrap().y < 0.0);
    }

    #[test]
    fn kinematic_pose_roundtrip() {
        let mut physics = PhysicsWorld::default();
        let handle = physics.add_kinematic(Vec3::ZERO);

        physics.set_body_position(handle, Vec3::new(1.0, 2.0, 3.0));
        physics.set_body_rotation(handle, Quat::from_rotation_y(1.0));

        assert_eq!(physics.body_position(handle), Some(Vec3::new(1.0, 2.0, 3.0)));
        let rotation = physics.body_rotation(handle).unwrap();
        assert!(rotation.angle_between(Quat::from_rotation_y(1.0)) < 1e-4);
    }
}
