use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tether::{DeliveryMode, Outgoing};

/// Loss and latency applied to one direction of the simulated link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConditions {
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self {
            loss_percent: 0.0,
            min_latency_ms: 40,
            max_latency_ms: 60,
            jitter_ms: 10,
        }
    }
}

#[derive(Debug)]
struct DelayedMessage {
    release_time: f64,
    order: u64,
    message: Outgoing,
}

impl PartialEq for DelayedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedMessage {}

impl PartialOrd for DelayedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the heap pops the earliest release first.
        other
            .release_time
            .total_cmp(&self.release_time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LinkStats {
    pub sent: u64,
    pub dropped: u64,
    pub delivered: u64,
}

/// One-way link running on virtual time.
///
/// Unreliable messages may be dropped and reordered by jitter. Reliable ones
/// always arrive, in the order they were sent.
pub struct LossyLink {
    conditions: LinkConditions,
    rng: StdRng,
    queue: BinaryHeap<DelayedMessage>,
    next_order: u64,
    last_reliable_release: f64,
    stats: LinkStats,
}

impl LossyLink {
    pub fn new(conditions: LinkConditions, seed: u64) -> Self {
        Self {
            conditions,
            rng: StdRng::seed_from_u64(seed),
            queue: BinaryHeap::new(),
            next_order: 0,
            last_reliable_release: 0.0,
            stats: LinkStats::default(),
        }
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    fn delay_secs(&mut self) -> f64 {
        let min = self.conditions.min_latency_ms;
        let max = self.conditions.max_latency_ms.max(min);
        let base = if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        };
        let jitter = if self.conditions.jitter_ms > 0 {
            self.rng.gen_range(0..=self.conditions.jitter_ms)
        } else {
            0
        };
        f64::from(base + jitter) / 1000.0
    }

    fn should_drop(&mut self) -> bool {
        let p = f64::from(self.conditions.loss_percent / 100.0).clamp(0.0, 1.0);
        p > 0.0 && self.rng.gen_bool(p)
    }

    pub fn send(&mut self, now: f64, message: Outgoing) {
        self.stats.sent += 1;

        let reliable = message.delivery == DeliveryMode::Reliable;
        if !reliable && self.should_drop() {
            self.stats.dropped += 1;
            log::trace!("link dropped {:?} message", message.channel);
            return;
        }

        let mut release_time = now + self.delay_secs();
        if reliable {
            release_time = release_time.max(self.last_reliable_release);
            self.last_reliable_release = release_time;
        }

        self.queue.push(DelayedMessage {
            release_time,
            order: self.next_order,
            message,
        });
        self.next_order += 1;
    }

    /// Messages whose latency has elapsed by `now`.
    pub fn take(&mut self, now: f64) -> Vec<Outgoing> {
        let mut ready = Vec::new();
        while self.queue.peek().is_some_and(|d| d.release_time <= now) {
            if let Some(delayed) = self.queue.pop() {
                ready.push(delayed.message);
            }
        }
        self.stats.delivered += ready.len() as u64;
        ready
    }
}

/// A link frozen at one instant, handed to a synchronizer's flush.
pub struct LinkAt<'a> {
    pub link: &'a mut LossyLink,
    pub now: f64,
}

impl tether::Transport for LinkAt<'_> {
    fn send(&mut self, message: Outgoing) {
        self.link.send(self.now, message);
    }
}
