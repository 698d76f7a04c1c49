use crate::config::SyncConfig;
use crate::snapshot::StateRecord;

/// Binary exponent offset of the smallest correction the clock applies,
/// giving a floor of `2^(CLOCK_FLOOR_EXPONENT - 24)` seconds.
pub const CLOCK_FLOOR_EXPONENT: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAdjustment {
    Snapped,
    Glided,
}

/// Estimate of the authority's clock, advanced with the local clock and
/// corrected whenever a record is stored.
#[derive(Debug, Clone, Default)]
pub struct ClockReconciler {
    estimate: f32,
    set_at: f32,
    last_observed: Option<f32>,
    received: u32,
}

impl ClockReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimated authority time at local time `local_now`.
    pub fn authority_time(&self, local_now: f32) -> f32 {
        self.estimate + (local_now - self.set_at)
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn minimum_step(current: f32) -> f32 {
        2f32.powi(CLOCK_FLOOR_EXPONENT - 24).max(current.abs() * f32::EPSILON * 2.0)
    }

    /// Folds a freshly stored record into the estimate.
    pub fn observe(
        &mut self,
        record: &StateRecord,
        local_now: f32,
        config: &SyncConfig,
    ) -> ClockAdjustment {
        let candidate = record.authority_timestamp + (local_now - record.received_timestamp);
        let current = self.authority_time(local_now);
        let elapsed = self
            .last_observed
            .map_or(0.0, |previous| (local_now - previous).max(0.0));
        let step = (config.time_correction_rate * elapsed).max(Self::minimum_step(current));
        let error = candidate - current;

        self.received = self.received.saturating_add(1);
        self.last_observed = Some(local_now);
        self.set_at = local_now;

        let warming_up = (self.received as f32) < config.send_rate;
        if warming_up || error.abs() <= step || error.abs() > config.time_snap_threshold {
            if !warming_up && error.abs() > config.time_snap_threshold {
                log::debug!("authority clock snapped by {error:.3}s");
            }
            self.estimate = candidate;
            ClockAdjustment::Snapped
        } else {
            self.estimate = current + step.copysign(error);
            ClockAdjustment::Glided
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Pose;

    fn config() -> SyncConfig {
        SyncConfig {
            send_rate: 2.0,
            time_correction_rate: 0.1,
            time_snap_threshold: 1.0,
            ..Default::default()
        }
    }

    fn record(authority: f32, received: f32) -> StateRecord {
        StateRecord {
            received_timestamp: received,
            ..StateRecord::new(Pose::default(), authority)
        }
    }

    fn warmed_up(config: &SyncConfig) -> ClockReconciler {
        let mut clock = ClockReconciler::new();
        clock.observe(&record(10.0, 0.0), 0.0, config);
        clock.observe(&record(10.5, 0.5), 0.5, config);
        clock
    }

    #[test]
    fn estimate_advances_with_local_time() {
        let config = config();
        let clock = warmed_up(&config);
        assert!((clock.authority_time(1.5) - 11.5).abs() < 1e-5);
    }

    #[test]
    fn first_records_snap() {
        let config = config();
        let mut clock = ClockReconciler::new();
        let adjustment = clock.observe(&record(50.0, 0.0), 0.0, &config);
        assert_eq!(adjustment, ClockAdjustment::Snapped);
        assert_eq!(clock.authority_time(0.0), 50.0);
    }

    #[test]
    fn moderate_error_glides_one_step() {
        let config = config();
        let mut clock = warmed_up(&config);

        // Half a second later the authority claims 0.3s more than expected.
        let adjustment = clock.observe(&record(11.3, 1.0), 1.0, &config);
        assert_eq!(adjustment, ClockAdjustment::Glided);

        let step = config.time_correction_rate * 0.5;
        assert!((clock.authority_time(1.0) - (11.0 + step)).abs() < 1e-5);
    }

    #[test]
    fn glide_follows_error_sign() {
        let config = config();
        let mut clock = warmed_up(&config);
        clock.observe(&record(10.7, 1.0), 1.0, &config);
        assert!((clock.authority_time(1.0) - (11.0 - 0.05)).abs() < 1e-5);
    }

    #[test]
    fn tiny_error_lands_within_one_step() {
        let config = config();
        let mut clock = warmed_up(&config);
        let before = clock.authority_time(1.0);

        clock.observe(&record(11.01, 1.0), 1.0, &config);
        let after = clock.authority_time(1.0);

        assert!((after - before).abs() <= config.time_correction_rate * 0.5 + 1e-6);
        assert!((after - 11.01).abs() < 1e-5);
    }

    #[test]
    fn large_error_snaps_exactly() {
        let config = config();
        let mut clock = warmed_up(&config);

        let adjustment = clock.observe(&record(25.0, 1.0), 1.0, &config);
        assert_eq!(adjustment, ClockAdjustment::Snapped);
        assert_eq!(clock.authority_time(1.0), 25.0);
    }

    #[test]
    fn late_processing_is_compensated() {
        let config = config();
        let mut clock = ClockReconciler::new();
        // Stored 0.25s after it arrived.
        clock.observe(&record(4.0, 1.0), 1.25, &config);
        assert_eq!(clock.authority_time(1.25), 4.25);
    }

    #[test]
    fn floor_prevents_stalling() {
        assert!(ClockReconciler::minimum_step(0.0) > 0.0);
        let large = 100_000.0f32;
        assert!(large + ClockReconciler::minimum_step(large) > large);
    }
}
