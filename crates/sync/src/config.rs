use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::authority::AuthorityMode;
use crate::codec::Channel;
use crate::error::ConfigError;

pub const DEFAULT_SEND_RATE: f32 = 30.0;
pub const DEFAULT_INTERPOLATION_DELAY: f32 = 0.1;
pub const MIN_HISTORY_CAPACITY: usize = 10;

bitflags! {
    /// Axes of a channel that take part in synchronization.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Axes: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const XY = Self::X.bits() | Self::Y.bits();
        const XYZ = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
    }
}

impl Axes {
    pub const ORDER: [Axes; 3] = [Axes::X, Axes::Y, Axes::Z];

    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }

    /// Takes the selected axes from `source` and the rest from `fallback`.
    pub fn select(self, source: Vec3, fallback: Vec3) -> Vec3 {
        Vec3::new(
            if self.contains(Axes::X) { source.x } else { fallback.x },
            if self.contains(Axes::Y) { source.y } else { fallback.y },
            if self.contains(Axes::Z) { source.z } else { fallback.z },
        )
    }

    /// Component-wise distance restricted to the selected axes.
    pub fn distance(self, a: Vec3, b: Vec3) -> f32 {
        let mask = self.select(Vec3::ONE, Vec3::ZERO);
        ((a - b) * mask).length()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtrapolationMode {
    None,
    #[default]
    Limited,
    Unlimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TickSource {
    #[default]
    Render,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtrapolationLimits {
    /// Seconds past the newest record after which extrapolation gives up.
    pub time: Option<f32>,
    /// Maximum projected displacement from the newest record.
    pub distance: Option<f32>,
}

impl Default for ExtrapolationLimits {
    fn default() -> Self {
        Self {
            time: Some(5.0),
            distance: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub axes: Axes,
    /// Send as half-precision floats.
    pub compress: bool,
    /// Minimum change since the last sent value before the channel is sent.
    pub send_threshold: f32,
    /// Minimum change before a receiver writes the channel to its body.
    pub update_threshold: f32,
    /// Endpoint distance above which the channel skips blending. Zero disables.
    pub snap_threshold: f32,
    /// Fraction of the remaining distance covered per tick.
    pub lerp_rate: f32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            axes: Axes::XYZ,
            compress: false,
            send_threshold: 0.0,
            update_threshold: 0.0,
            snap_threshold: 0.0,
            lerp_rate: 0.85,
        }
    }
}

impl ChannelSettings {
    pub fn disabled() -> Self {
        Self {
            axes: Axes::empty(),
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.axes.is_empty()
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.lerp_rate) {
            return Err(ConfigError::LerpRate {
                name,
                value: self.lerp_rate,
            });
        }
        for value in [self.send_threshold, self.update_threshold, self.snap_threshold] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Snapshots per second sent by the authority.
    pub send_rate: f32,
    /// Rendering lag in seconds behind the estimated authority time.
    pub interpolation_delay: f32,
    pub extrapolation: ExtrapolationMode,
    pub extrapolation_limits: ExtrapolationLimits,

    pub position: ChannelSettings,
    pub rotation: ChannelSettings,
    pub scale: ChannelSettings,
    pub velocity: ChannelSettings,
    pub angular_velocity: ChannelSettings,

    /// Seconds of clock correction applied per second of elapsed time.
    pub time_correction_rate: f32,
    /// Clock discrepancy in seconds above which the estimate snaps.
    pub time_snap_threshold: f32,
    /// Consecutive unchanged ticks before a channel is considered at rest.
    pub rest_tick_count: u32,

    pub authority_mode: AuthorityMode,
    /// Drive remote bodies through velocity instead of position.
    pub set_velocity_on_remotes: bool,
    /// Position error above which velocity driving falls back to a position write.
    pub velocity_correction_distance: f32,

    pub gravity: Vec3,
    pub tick_source: TickSource,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            send_rate: DEFAULT_SEND_RATE,
            interpolation_delay: DEFAULT_INTERPOLATION_DELAY,
            extrapolation: ExtrapolationMode::default(),
            extrapolation_limits: ExtrapolationLimits::default(),
            position: ChannelSettings::default(),
            rotation: ChannelSettings::default(),
            scale: ChannelSettings::default(),
            velocity: ChannelSettings::default(),
            angular_velocity: ChannelSettings::default(),
            time_correction_rate: 0.1,
            time_snap_threshold: 3.0,
            rest_tick_count: 3,
            authority_mode: AuthorityMode::default(),
            set_velocity_on_remotes: false,
            velocity_correction_distance: 10.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            tick_source: TickSource::default(),
        }
    }
}

impl SyncConfig {
    pub fn send_interval(&self) -> f32 {
        1.0 / self.send_rate
    }

    pub fn history_capacity(&self) -> usize {
        let needed = (self.send_rate * self.interpolation_delay).ceil() as usize + 1;
        needed.max(MIN_HISTORY_CAPACITY)
    }

    pub fn channel(&self, channel: Channel) -> &ChannelSettings {
        match channel {
            Channel::Position => &self.position,
            Channel::Rotation => &self.rotation,
            Channel::Scale => &self.scale,
            Channel::Velocity => &self.velocity,
            Channel::AngularVelocity => &self.angular_velocity,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.send_rate.is_finite() || self.send_rate <= 0.0 {
            return Err(ConfigError::SendRate(self.send_rate));
        }
        if self.interpolation_delay.is_nan() || self.interpolation_delay < 0.0 {
            return Err(ConfigError::InterpolationDelay(self.interpolation_delay));
        }
        if self.rest_tick_count == 0 {
            return Err(ConfigError::RestTickCount);
        }

        self.position.validate("position")?;
        self.rotation.validate("rotation")?;
        self.scale.validate("scale")?;
        self.velocity.validate("velocity")?;
        self.angular_velocity.validate("angular_velocity")?;

        let scalars = [
            ("time_correction_rate", Some(self.time_correction_rate)),
            ("time_snap_threshold", Some(self.time_snap_threshold)),
            ("velocity_correction_distance", Some(self.velocity_correction_distance)),
            ("extrapolation_limits.time", self.extrapolation_limits.time),
            ("extrapolation_limits.distance", self.extrapolation_limits.distance),
        ];
        for (name, value) in scalars {
            if let Some(value) = value {
                if value.is_nan() || value < 0.0 {
                    return Err(ConfigError::Negative { name, value });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_has_a_floor() {
        let config = SyncConfig::default();
        assert_eq!(config.history_capacity(), MIN_HISTORY_CAPACITY);

        let config = SyncConfig {
            send_rate: 60.0,
            interpolation_delay: 0.5,
            ..Default::default()
        };
        assert_eq!(config.history_capacity(), 31);
    }

    #[test]
    fn axis_selection_keeps_fallback() {
        let picked = Axes::XY.select(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(-1.0));
        assert_eq!(picked, Vec3::new(1.0, 2.0, -1.0));
        assert_eq!(Axes::XY.count(), 2);
        assert_eq!(Axes::XY.distance(Vec3::ZERO, Vec3::new(3.0, 4.0, 100.0)), 5.0);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        config.send_rate = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::SendRate(_))));

        config = SyncConfig::default();
        config.rotation.lerp_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LerpRate { name: "rotation", .. })
        ));

        config = SyncConfig::default();
        config.extrapolation_limits.distance = Some(-1.0);
        assert!(matches!(config.validate(), Err(ConfigError::Negative { .. })));
    }
}
