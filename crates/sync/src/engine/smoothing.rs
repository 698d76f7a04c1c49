use glam::{Quat, Vec3};

use crate::config::{ChannelSettings, SyncConfig};
use crate::physics::PhysicalBody;

use super::interpolation::{InstantChannels, Target, slerp_shortest};

/// Writes an evaluated target to the body, easing each channel towards it.
///
/// Returns the channels that were actually written.
pub fn apply_target<B: PhysicalBody + ?Sized>(
    body: &mut B,
    target: &Target,
    config: &SyncConfig,
) -> InstantChannels {
    let mut written = InstantChannels::empty();
    let pose = &target.pose;
    let instant = target.instant;

    let mut velocity_driven = false;
    if config.position.is_enabled() {
        let current = body.position();
        let desired = config.position.axes.select(pose.position, current);
        let snap = instant.contains(InstantChannels::POSITION);

        if config.set_velocity_on_remotes && !snap {
            // Let the body's own physics carry it; only correct large drift.
            if current.distance(desired) > config.velocity_correction_distance {
                body.set_position(desired);
                written |= InstantChannels::POSITION;
            }
            body.set_velocity(config.velocity.axes.select(pose.velocity, Vec3::ZERO));
            written |= InstantChannels::VELOCITY;
            velocity_driven = true;
        } else if let Some(next) = step_vec(current, desired, &config.position, snap) {
            body.set_position(next);
            written |= InstantChannels::POSITION;
        }
    }

    if config.rotation.is_enabled() {
        let current = body.rotation();
        let snap = instant.contains(InstantChannels::ROTATION);
        if let Some(next) = step_quat(current, pose.rotation, &config.rotation, snap) {
            body.set_rotation(next);
            written |= InstantChannels::ROTATION;
        }
    }

    if config.scale.is_enabled() {
        let current = body.scale();
        let desired = config.scale.axes.select(pose.scale, current);
        let snap = instant.contains(InstantChannels::SCALE);
        if let Some(next) = step_vec(current, desired, &config.scale, snap) {
            body.set_scale(next);
            written |= InstantChannels::SCALE;
        }
    }

    if config.velocity.is_enabled() && !velocity_driven {
        let current = body.velocity();
        let desired = config.velocity.axes.select(pose.velocity, current);
        let snap = instant.contains(InstantChannels::VELOCITY);
        if let Some(next) = step_vec(current, desired, &config.velocity, snap) {
            body.set_velocity(next);
            written |= InstantChannels::VELOCITY;
        }
    }

    if config.angular_velocity.is_enabled() {
        let current = body.angular_velocity();
        let desired = config
            .angular_velocity
            .axes
            .select(pose.angular_velocity, current);
        let snap = instant.contains(InstantChannels::ANGULAR_VELOCITY);
        if let Some(next) = step_vec(current, desired, &config.angular_velocity, snap) {
            body.set_angular_velocity(next);
            written |= InstantChannels::ANGULAR_VELOCITY;
        }
    }

    written
}

/// Stops a body whose motion can no longer be predicted.
pub fn freeze<B: PhysicalBody + ?Sized>(body: &mut B) {
    body.set_velocity(Vec3::ZERO);
    body.set_angular_velocity(Vec3::ZERO);
}

fn step_vec(current: Vec3, desired: Vec3, settings: &ChannelSettings, snap: bool) -> Option<Vec3> {
    let change = current.distance(desired);
    if snap {
        return (change > 0.0).then_some(desired);
    }
    if change <= settings.update_threshold || change == 0.0 {
        return None;
    }
    Some(current.lerp(desired, settings.lerp_rate))
}

fn step_quat(current: Quat, desired: Quat, settings: &ChannelSettings, snap: bool) -> Option<Quat> {
    let change = current.angle_between(desired).to_degrees();
    if snap {
        return (change > 0.0).then_some(desired);
    }
    if change <= settings.update_threshold || change == 0.0 {
        return None;
    }
    Some(slerp_shortest(current, desired, settings.lerp_rate).normalize())
}
