#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestTransition {
    Unchanged,
    CameToRest,
    Resumed,
}

/// Counts consecutive ticks without movement on one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestTracker {
    still_ticks: u32,
    at_rest: bool,
}

impl RestTracker {
    pub fn at_rest(&self) -> bool {
        self.at_rest
    }

    pub fn observe(&mut self, moved: bool, rest_tick_count: u32) -> RestTransition {
        if moved {
            self.still_ticks = 0;
            if self.at_rest {
                self.at_rest = false;
                return RestTransition::Resumed;
            }
            return RestTransition::Unchanged;
        }

        self.still_ticks = self.still_ticks.saturating_add(1);
        if !self.at_rest && self.still_ticks >= rest_tick_count {
            self.at_rest = true;
            return RestTransition::CameToRest;
        }
        RestTransition::Unchanged
    }

    /// Marks the channel as resting, e.g. after a teleport.
    pub fn settle(&mut self, rest_tick_count: u32) {
        self.still_ticks = rest_tick_count;
        self.at_rest = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_after_threshold_ticks() {
        let mut tracker = RestTracker::default();
        assert_eq!(tracker.observe(false, 3), RestTransition::Unchanged);
        assert_eq!(tracker.observe(false, 3), RestTransition::Unchanged);
        assert_eq!(tracker.observe(false, 3), RestTransition::CameToRest);
        assert!(tracker.at_rest());
        assert_eq!(tracker.observe(false, 3), RestTransition::Unchanged);
    }

    #[test]
    fn movement_resumes() {
        let mut tracker = RestTracker::default();
        tracker.settle(3);
        assert_eq!(tracker.observe(true, 3), RestTransition::Resumed);
        assert!(!tracker.at_rest());
        assert_eq!(tracker.observe(true, 3), RestTransition::Unchanged);
    }

    #[test]
    fn movement_restarts_the_count() {
        let mut tracker = RestTracker::default();
        tracker.observe(false, 3);
        tracker.observe(false, 3);
        tracker.observe(true, 3);
        tracker.observe(false, 3);
        assert!(!tracker.at_rest());
    }
}
