use glam::{Quat, Vec3};

/// Read/write access to the thing being synchronized.
///
/// Angular velocity is in radians per second. Drag and gravity scale only feed
/// extrapolation; bodies without physics keep the zero defaults.
pub trait PhysicalBody {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);

    fn rotation(&self) -> Quat;
    fn set_rotation(&mut self, rotation: Quat);

    fn scale(&self) -> Vec3;
    fn set_scale(&mut self, scale: Vec3);

    fn velocity(&self) -> Vec3;
    fn set_velocity(&mut self, velocity: Vec3);

    fn angular_velocity(&self) -> Vec3;
    fn set_angular_velocity(&mut self, angular_velocity: Vec3);

    fn drag(&self) -> f32 {
        0.0
    }

    fn angular_drag(&self) -> f32 {
        0.0
    }

    fn gravity_scale(&self) -> f32 {
        0.0
    }
}

/// A plain transform with optional motion parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub drag: f32,
    pub angular_drag: f32,
    pub gravity_scale: f32,
}

impl Default for TransformBody {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            drag: 0.0,
            angular_drag: 0.0,
            gravity_scale: 0.0,
        }
    }
}

impl TransformBody {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Advances position and rotation by the current velocities.
    pub fn integrate(&mut self, dt: f32) {
        self.position += self.velocity * dt;
        if self.angular_velocity != Vec3::ZERO {
            self.rotation =
                (Quat::from_scaled_axis(self.angular_velocity * dt) * self.rotation).normalize();
        }
    }
}

impl PhysicalBody for TransformBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn scale(&self) -> Vec3 {
        self.scale
    }

    fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        self.angular_velocity = angular_velocity;
    }

    fn drag(&self) -> f32 {
        self.drag
    }

    fn angular_drag(&self) -> f32 {
        self.angular_drag
    }

    fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }
}
