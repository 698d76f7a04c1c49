use bitflags::bitflags;
use glam::{Quat, Vec3};

use crate::codec::Channel;
use crate::config::{ExtrapolationMode, SyncConfig};
use crate::physics::PhysicalBody;
use crate::snapshot::{Pose, SnapshotHistory, StateRecord};

bitflags! {
    /// Channels to write straight to the body this tick, skipping smoothing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstantChannels: u8 {
        const POSITION = 1 << 0;
        const ROTATION = 1 << 1;
        const SCALE = 1 << 2;
        const VELOCITY = 1 << 3;
        const ANGULAR_VELOCITY = 1 << 4;
    }
}

impl From<Channel> for InstantChannels {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Position => Self::POSITION,
            Channel::Rotation => Self::ROTATION,
            Channel::Scale => Self::SCALE,
            Channel::Velocity => Self::VELOCITY,
            Channel::AngularVelocity => Self::ANGULAR_VELOCITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Interpolated,
    Held,
    Extrapolated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub pose: Pose,
    pub outcome: Outcome,
    pub instant: InstantChannels,
    /// Blend factor between the bracketing records; 1 outside interpolation.
    pub t: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// Nothing received yet.
    Empty,
    Target(Target),
    /// The newest record is too old or has drifted too far to project.
    ExtrapolationFailed,
}

/// Damping and gravity used when projecting motion forward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionParams {
    pub drag: f32,
    pub angular_drag: f32,
    pub gravity: Vec3,
}

impl MotionParams {
    pub fn from_body<B: PhysicalBody + ?Sized>(body: &B, config: &SyncConfig) -> Self {
        Self {
            drag: body.drag(),
            angular_drag: body.angular_drag(),
            gravity: config.gravity * body.gravity_scale(),
        }
    }
}

/// Turns history plus a render time into the pose an observer should show.
#[derive(Debug, Default)]
pub struct Interpolator {
    last_end_timestamp: Option<f32>,
}

impl Interpolator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last_end_timestamp = None;
    }

    pub fn evaluate(
        &mut self,
        history: &SnapshotHistory,
        target_time: f32,
        config: &SyncConfig,
        motion: &MotionParams,
    ) -> Evaluation {
        let Some(newest) = history.newest() else {
            return Evaluation::Empty;
        };

        if history.len() >= 2 && newest.authority_timestamp > target_time {
            return Evaluation::Target(self.interpolate(history, target_time, config));
        }

        if newest.at_rest() {
            return Evaluation::Target(held(newest));
        }

        extrapolate(newest, target_time, config, motion)
    }

    fn interpolate(
        &mut self,
        history: &SnapshotHistory,
        target_time: f32,
        config: &SyncConfig,
    ) -> Target {
        let Some(start_slot) = history
            .iter()
            .position(|r| r.authority_timestamp <= target_time)
        else {
            // Rendering further back than anything we hold: show the oldest.
            let oldest = history.get(history.len() - 1).copied().unwrap_or_default();
            return Target {
                pose: oldest.pose,
                outcome: Outcome::Interpolated,
                instant: InstantChannels::empty(),
                t: 0.0,
            };
        };

        // newest is ahead of target_time, so the start is never slot 0.
        let start = history.get(start_slot).copied().unwrap_or_default();
        let end = history.get(start_slot - 1).copied().unwrap_or(start);
        let previous_end = self.last_end_timestamp.replace(end.authority_timestamp);

        if start.is_teleport {
            log::trace!("holding teleport at {}", start.authority_timestamp);
            return Target {
                pose: start.pose,
                outcome: Outcome::Interpolated,
                instant: InstantChannels::all(),
                t: 1.0,
            };
        }

        let span = end.authority_timestamp - start.authority_timestamp;
        let mut t = if span > 0.0 {
            ((target_time - start.authority_timestamp) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let mut instant = InstantChannels::empty();

        // A teleport we stepped over since the last tick must not be eased
        // through. One that was last tick's end was held, never shown.
        let skipped_teleport = history.iter().skip(start_slot + 1).any(|r| {
            r.is_teleport && previous_end.is_some_and(|prev| r.authority_timestamp >= prev)
        });
        if skipped_teleport {
            t = 1.0;
            instant = InstantChannels::all();
        } else if end.is_teleport {
            // Stay on this side of the jump until its time comes.
            t = 0.0;
        }

        let mut pose = blend(&start.pose, &end.pose, t);
        for channel in Channel::ALL {
            let threshold = config.channel(channel).snap_threshold;
            if threshold > 0.0 && channel_distance(&start.pose, &end.pose, channel) > threshold {
                copy_channel(&mut pose, &end.pose, channel);
                instant |= InstantChannels::from(channel);
            }
        }

        Target {
            pose,
            outcome: Outcome::Interpolated,
            instant,
            t,
        }
    }
}

fn held(record: &StateRecord) -> Target {
    let instant = if record.is_teleport {
        InstantChannels::all()
    } else {
        InstantChannels::empty()
    };
    Target {
        pose: record.pose,
        outcome: Outcome::Held,
        instant,
        t: 1.0,
    }
}

fn extrapolate(
    newest: &StateRecord,
    target_time: f32,
    config: &SyncConfig,
    motion: &MotionParams,
) -> Evaluation {
    let elapsed = target_time - newest.authority_timestamp;
    if elapsed <= 0.0 || config.extrapolation == ExtrapolationMode::None {
        return Evaluation::Target(held(newest));
    }

    let limited = config.extrapolation == ExtrapolationMode::Limited;
    if limited
        && config
            .extrapolation_limits
            .time
            .is_some_and(|limit| elapsed > limit)
    {
        return Evaluation::ExtrapolationFailed;
    }

    let pose = project(&newest.pose, elapsed, motion);

    if limited
        && config
            .extrapolation_limits
            .distance
            .is_some_and(|limit| pose.position.distance(newest.pose.position) > limit)
    {
        return Evaluation::ExtrapolationFailed;
    }

    Evaluation::Target(Target {
        pose,
        outcome: Outcome::Extrapolated,
        instant: InstantChannels::empty(),
        t: 1.0,
    })
}

/// Closed-form motion under linear drag `k` and constant acceleration `g`:
/// `v' = g - k v`.
pub fn project(pose: &Pose, elapsed: f32, motion: &MotionParams) -> Pose {
    let k = motion.drag.max(0.0);
    let g = motion.gravity;
    let v0 = pose.velocity;

    let (displacement, velocity) = if k > f32::EPSILON {
        let terminal = g / k;
        let decay = (-k * elapsed).exp();
        let displacement = terminal * elapsed + (v0 - terminal) * (1.0 - decay) / k;
        (displacement, terminal + (v0 - terminal) * decay)
    } else {
        (v0 * elapsed + 0.5 * g * elapsed * elapsed, v0 + g * elapsed)
    };

    let ka = motion.angular_drag.max(0.0);
    let w0 = pose.angular_velocity;
    let (turned, angular_velocity) = if ka > f32::EPSILON {
        let decay = (-ka * elapsed).exp();
        (w0 * (1.0 - decay) / ka, w0 * decay)
    } else {
        (w0 * elapsed, w0)
    };

    Pose {
        position: pose.position + displacement,
        rotation: (Quat::from_scaled_axis(turned) * pose.rotation).normalize(),
        scale: pose.scale,
        velocity,
        angular_velocity,
    }
}

pub fn blend(from: &Pose, to: &Pose, t: f32) -> Pose {
    Pose {
        position: from.position.lerp(to.position, t),
        rotation: slerp_shortest(from.rotation, to.rotation, t),
        scale: from.scale.lerp(to.scale, t),
        velocity: from.velocity.lerp(to.velocity, t),
        angular_velocity: from.angular_velocity.lerp(to.angular_velocity, t),
    }
}

pub fn slerp_shortest(from: Quat, to: Quat, t: f32) -> Quat {
    if from.dot(to) < 0.0 {
        from.slerp(-to, t)
    } else {
        from.slerp(to, t)
    }
}

/// Distance between two poses on one channel; rotation is in degrees.
pub fn channel_distance(a: &Pose, b: &Pose, channel: Channel) -> f32 {
    match channel {
        Channel::Position => a.position.distance(b.position),
        Channel::Rotation => a.rotation.angle_between(b.rotation).to_degrees(),
        Channel::Scale => a.scale.distance(b.scale),
        Channel::Velocity => a.velocity.distance(b.velocity),
        Channel::AngularVelocity => a.angular_velocity.distance(b.angular_velocity),
    }
}

pub fn copy_channel(into: &mut Pose, from: &Pose, channel: Channel) {
    match channel {
        Channel::Position => into.position = from.position,
        Channel::Rotation => into.rotation = from.rotation,
        Channel::Scale => into.scale = from.scale,
        Channel::Velocity => into.velocity = from.velocity,
        Channel::AngularVelocity => into.angular_velocity = from.angular_velocity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtrapolationLimits;

    fn record(time: f32, x: f32, vx: f32) -> StateRecord {
        StateRecord::new(
            Pose {
                position: Vec3::new(x, 0.0, 0.0),
                velocity: Vec3::new(vx, 0.0, 0.0),
                ..Default::default()
            },
            time,
        )
    }

    fn history(records: &[StateRecord]) -> SnapshotHistory {
        let mut history = SnapshotHistory::new(16);
        for record in records {
            history.insert(*record);
        }
        history
    }

    fn target(evaluation: Evaluation) -> Target {
        match evaluation {
            Evaluation::Target(target) => target,
            other => panic!("expected a target, got {other:?}"),
        }
    }

    #[test]
    fn empty_history_has_no_target() {
        let mut interpolator = Interpolator::new();
        let history = SnapshotHistory::new(4);
        assert_eq!(
            interpolator.evaluate(&history, 1.0, &SyncConfig::default(), &MotionParams::default()),
            Evaluation::Empty
        );
    }

    #[test]
    fn interpolates_between_brackets() {
        let mut interpolator = Interpolator::new();
        let history = history(&[record(0.0, 0.0, 1.0), record(1.0, 10.0, 1.0)]);

        let target = target(interpolator.evaluate(
            &history,
            0.25,
            &SyncConfig::default(),
            &MotionParams::default(),
        ));

        assert_eq!(target.outcome, Outcome::Interpolated);
        assert!((target.t - 0.25).abs() < 1e-6);
        assert!((target.pose.position.x - 2.5).abs() < 1e-5);
        assert!(target.instant.is_empty());
    }

    #[test]
    fn blended_position_stays_on_segment() {
        let mut interpolator = Interpolator::new();
        let a = Vec3::new(-3.0, 1.0, 2.0);
        let b = Vec3::new(5.0, -2.0, 7.0);
        let mut first = StateRecord::new(Pose::default(), 1.0);
        first.pose.position = a;
        let mut second = StateRecord::new(Pose::default(), 2.0);
        second.pose.position = b;
        let history = history(&[first, second]);

        for i in 1..20 {
            let time = 1.0 + i as f32 / 20.0;
            let target = target(interpolator.evaluate(
                &history,
                time,
                &SyncConfig::default(),
                &MotionParams::default(),
            ));
            assert!((0.0..=1.0).contains(&target.t));
            let on_segment = a.lerp(b, target.t);
            assert!((target.pose.position - on_segment).length() < 1e-4);
            assert!(target.pose.position.distance(a) <= a.distance(b) + 1e-4);
        }
    }

    #[test]
    fn target_older_than_history_uses_oldest() {
        let mut interpolator = Interpolator::new();
        let history = history(&[record(1.0, 1.0, 0.0), record(2.0, 2.0, 0.0)]);

        let target = target(interpolator.evaluate(
            &history,
            0.5,
            &SyncConfig::default(),
            &MotionParams::default(),
        ));
        assert_eq!(target.pose.position.x, 1.0);
    }

    #[test]
    fn snap_threshold_skips_blending() {
        let mut interpolator = Interpolator::new();
        let mut config = SyncConfig::default();
        config.position.snap_threshold = 5.0;
        let history = history(&[record(0.0, 0.0, 0.0), record(1.0, 50.0, 0.0)]);

        let target = target(interpolator.evaluate(
            &history,
            0.5,
            &config,
            &MotionParams::default(),
        ));
        assert_eq!(target.pose.position.x, 50.0);
        assert!(target.instant.contains(InstantChannels::POSITION));
        assert!(!target.instant.contains(InstantChannels::ROTATION));
    }

    #[test]
    fn resting_newest_is_held() {
        let mut interpolator = Interpolator::new();
        let mut resting = record(1.0, 4.0, 0.0);
        resting.at_positional_rest = true;
        resting.at_rotational_rest = true;
        let history = history(&[record(0.0, 0.0, 4.0), resting]);

        let target = target(interpolator.evaluate(
            &history,
            3.0,
            &SyncConfig::default(),
            &MotionParams::default(),
        ));
        assert_eq!(target.outcome, Outcome::Held);
        assert_eq!(target.pose.position.x, 4.0);
    }

    #[test]
    fn extrapolates_along_velocity() {
        let mut interpolator = Interpolator::new();
        let history = history(&[record(0.0, 0.0, 2.0), record(1.0, 2.0, 2.0)]);

        let target = target(interpolator.evaluate(
            &history,
            1.5,
            &SyncConfig::default(),
            &MotionParams::default(),
        ));
        assert_eq!(target.outcome, Outcome::Extrapolated);
        assert!((target.pose.position.x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn extrapolation_mode_none_holds() {
        let mut interpolator = Interpolator::new();
        let config = SyncConfig {
            extrapolation: ExtrapolationMode::None,
            ..Default::default()
        };
        let history = history(&[record(1.0, 2.0, 2.0)]);

        let target = target(interpolator.evaluate(&history, 5.0, &config, &MotionParams::default()));
        assert_eq!(target.outcome, Outcome::Held);
        assert_eq!(target.pose.position.x, 2.0);
    }

    #[test]
    fn limits_abort_extrapolation() {
        let mut interpolator = Interpolator::new();
        let history = history(&[record(1.0, 0.0, 10.0)]);

        let time_limited = SyncConfig {
            extrapolation_limits: ExtrapolationLimits {
                time: Some(0.5),
                distance: None,
            },
            ..Default::default()
        };
        assert_eq!(
            interpolator.evaluate(&history, 2.0, &time_limited, &MotionParams::default()),
            Evaluation::ExtrapolationFailed
        );

        let distance_limited = SyncConfig {
            extrapolation_limits: ExtrapolationLimits {
                time: None,
                distance: Some(3.0),
            },
            ..Default::default()
        };
        assert_eq!(
            interpolator.evaluate(&history, 1.5, &distance_limited, &MotionParams::default()),
            Evaluation::ExtrapolationFailed
        );

        let unlimited = SyncConfig {
            extrapolation: ExtrapolationMode::Unlimited,
            ..distance_limited
        };
        assert!(matches!(
            interpolator.evaluate(&history, 1.5, &unlimited, &MotionParams::default()),
            Evaluation::Target(_)
        ));
    }

    #[test]
    fn projection_applies_gravity_and_drag() {
        let pose = Pose {
            velocity: Vec3::new(4.0, 0.0, 0.0),
            ..Default::default()
        };

        let falling = project(
            &pose,
            1.0,
            &MotionParams {
                gravity: Vec3::new(0.0, -10.0, 0.0),
                ..Default::default()
            },
        );
        assert!((falling.position - Vec3::new(4.0, -5.0, 0.0)).length() < 1e-4);
        assert!((falling.velocity - Vec3::new(4.0, -10.0, 0.0)).length() < 1e-4);

        let dragged = project(
            &pose,
            1.0,
            &MotionParams {
                drag: 1.0,
                ..Default::default()
            },
        );
        let expected = 4.0 * (1.0 - (-1.0f32).exp());
        assert!((dragged.position.x - expected).abs() < 1e-4);
        assert!(dragged.velocity.x < 4.0);
    }

    #[test]
    fn projection_turns_with_angular_velocity() {
        let pose = Pose {
            angular_velocity: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            ..Default::default()
        };
        let turned = project(&pose, 1.0, &MotionParams::default());
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        assert!(turned.rotation.angle_between(expected) < 1e-4);
    }

    #[test]
    fn teleport_start_is_shown_exactly() {
        let mut interpolator = Interpolator::new();
        let mut history = history(&[
            record(0.0, 0.0, 1.0),
            record(0.1, 0.1, 1.0),
            record(0.2, 0.2, 1.0),
        ]);
        history.insert_teleport(record(0.15, 100.0, 0.0));

        let target = target(interpolator.evaluate(
            &history,
            0.18,
            &SyncConfig::default(),
            &MotionParams::default(),
        ));
        assert_eq!(target.pose.position, Vec3::new(100.0, 0.0, 0.0));
        assert_eq!(target.t, 1.0);
        assert_eq!(target.instant, InstantChannels::all());
    }

    #[test]
    fn teleport_ahead_is_not_eased_towards() {
        let mut interpolator = Interpolator::new();
        let mut history = history(&[record(0.0, 0.0, 1.0), record(0.1, 0.1, 1.0)]);
        history.insert_teleport(record(0.2, 100.0, 0.0));

        let target = target(interpolator.evaluate(
            &history,
            0.15,
            &SyncConfig::default(),
            &MotionParams::default(),
        ));
        assert!((target.pose.position.x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn skipped_teleport_snaps_to_end() {
        let mut interpolator = Interpolator::new();
        let mut history = history(&[record(0.0, 0.0, 1.0), record(0.1, 0.1, 1.0)]);

        interpolator.evaluate(&history, 0.05, &SyncConfig::default(), &MotionParams::default());

        history.insert_teleport(record(0.2, 100.0, 0.0));
        history.insert(record(0.3, 101.0, 1.0));
        history.insert(record(0.4, 102.0, 1.0));

        // The render time jumps past the teleport in a single tick.
        let target = target(interpolator.evaluate(
            &history,
            0.35,
            &SyncConfig::default(),
            &MotionParams::default(),
        ));
        assert_eq!(target.t, 1.0);
        assert_eq!(target.pose.position.x, 102.0);
        assert!(target.instant.contains(InstantChannels::POSITION));
    }
}
