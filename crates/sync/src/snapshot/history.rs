use std::collections::VecDeque;

use super::StateRecord;

/// Received records for one entity, newest first.
///
/// Slot 0 is the most recent record. Normal insertion only ever adds at the
/// front; teleports may land further back to keep timestamps descending.
#[derive(Debug)]
pub struct SnapshotHistory {
    records: VecDeque<StateRecord>,
    capacity: usize,
    positional_rest: bool,
    rotational_rest: bool,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            positional_rest: false,
            rotational_rest: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn newest(&self) -> Option<&StateRecord> {
        self.records.front()
    }

    pub fn get(&self, slot: usize) -> Option<&StateRecord> {
        self.records.get(slot)
    }

    /// Records from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &StateRecord> {
        self.records.iter()
    }

    pub fn at_positional_rest(&self) -> bool {
        self.positional_rest
    }

    pub fn at_rotational_rest(&self) -> bool {
        self.rotational_rest
    }

    /// Inserts a continuous-motion record. Returns `false` without touching
    /// the history when the record is not newer than slot 0.
    pub fn insert(&mut self, record: StateRecord) -> bool {
        if let Some(newest) = self.records.front() {
            if record.authority_timestamp <= newest.authority_timestamp {
                log::trace!(
                    "dropping stale record {} (newest {})",
                    record.authority_timestamp,
                    newest.authority_timestamp
                );
                return false;
            }
        }

        self.push_front(record);
        true
    }

    /// Inserts a teleport record at its sorted position, whatever order it
    /// arrived in. Teleports are always stored at rest.
    pub fn insert_teleport(&mut self, mut record: StateRecord) {
        record.is_teleport = true;
        record.at_positional_rest = true;
        record.at_rotational_rest = true;

        let newer_than_front = self
            .records
            .front()
            .is_none_or(|newest| record.authority_timestamp > newest.authority_timestamp);
        if newer_than_front {
            self.push_front(record);
            return;
        }

        if self.records.len() == self.capacity {
            self.records.pop_back();
        }

        // Walk from the oldest record towards the newest and stop at the first
        // one strictly newer than the teleport; it goes right behind that one.
        let mut slot = 0;
        for i in (0..self.records.len()).rev() {
            if self.records[i].authority_timestamp > record.authority_timestamp {
                slot = i + 1;
                break;
            }
        }

        log::debug!(
            "teleport at {} inserted out of order into slot {}",
            record.authority_timestamp,
            slot
        );
        self.records.insert(slot, record);
    }

    /// Changes the capacity, dropping the oldest records that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(2);
        self.records.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.positional_rest = false;
        self.rotational_rest = false;
    }

    fn push_front(&mut self, record: StateRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_back();
        }
        self.positional_rest = record.at_positional_rest;
        self.rotational_rest = record.at_rotational_rest;
        self.records.push_front(record);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::snapshot::Pose;

    fn record(time: f32) -> StateRecord {
        StateRecord::new(
            Pose {
                position: Vec3::new(time, 0.0, 0.0),
                ..Default::default()
            },
            time,
        )
    }

    fn timestamps(history: &SnapshotHistory) -> Vec<f32> {
        history.iter().map(|r| r.authority_timestamp).collect()
    }

    fn is_descending(history: &SnapshotHistory) -> bool {
        timestamps(history).windows(2).all(|w| w[0] >= w[1])
    }

    #[test]
    fn newest_first() {
        let mut history = SnapshotHistory::new(4);
        assert!(history.insert(record(0.1)));
        assert!(history.insert(record(0.2)));
        assert!(history.insert(record(0.3)));

        assert_eq!(timestamps(&history), vec![0.3, 0.2, 0.1]);
        assert_eq!(history.newest().unwrap().authority_timestamp, 0.3);
    }

    #[test]
    fn stale_and_duplicate_records_are_dropped() {
        let mut history = SnapshotHistory::new(4);
        history.insert(record(0.2));

        assert!(!history.insert(record(0.2)));
        assert!(!history.insert(record(0.1)));
        assert_eq!(timestamps(&history), vec![0.2]);
    }

    #[test]
    fn oldest_falls_off_at_capacity() {
        let mut history = SnapshotHistory::new(3);
        for i in 1..=5 {
            history.insert(record(i as f32));
        }
        assert_eq!(timestamps(&history), vec![5.0, 4.0, 3.0]);
    }

    #[test]
    fn teleport_lands_in_sorted_position() {
        let mut history = SnapshotHistory::new(8);
        history.insert(record(0.0));
        history.insert(record(0.1));
        history.insert(record(0.2));

        history.insert_teleport(record(0.15));

        assert_eq!(timestamps(&history), vec![0.2, 0.15, 0.1, 0.0]);
        let teleport = history.get(1).unwrap();
        assert!(teleport.is_teleport);
        assert!(teleport.at_rest());
    }

    #[test]
    fn teleport_older_than_everything_goes_last() {
        let mut history = SnapshotHistory::new(8);
        history.insert(record(1.0));
        history.insert(record(2.0));

        history.insert_teleport(record(0.5));
        assert_eq!(timestamps(&history), vec![2.0, 1.0, 0.5]);
    }

    #[test]
    fn teleport_into_full_history_keeps_order() {
        let mut history = SnapshotHistory::new(3);
        history.insert(record(1.0));
        history.insert(record(2.0));
        history.insert(record(3.0));

        history.insert_teleport(record(2.5));
        assert_eq!(timestamps(&history), vec![3.0, 2.5, 2.0]);
        assert!(is_descending(&history));
    }

    #[test]
    fn ordering_survives_mixed_insertions() {
        let mut history = SnapshotHistory::new(6);
        let sequence = [0.1, 0.3, 0.2, 0.5, 0.4, 0.7, 0.6, 0.65, 0.9];
        for (i, time) in sequence.into_iter().enumerate() {
            if i % 3 == 2 {
                history.insert_teleport(record(time));
            } else {
                history.insert(record(time));
            }
            assert!(is_descending(&history), "{:?}", timestamps(&history));
        }
    }

    #[test]
    fn clear_resets_rest_tracking() {
        let mut history = SnapshotHistory::new(4);
        let mut resting = record(1.0);
        resting.at_positional_rest = true;
        resting.at_rotational_rest = true;
        history.insert(resting);
        assert!(history.at_positional_rest());

        history.clear();
        assert!(history.is_empty());
        assert!(!history.at_positional_rest());
        assert!(!history.at_rotational_rest());
    }
}
