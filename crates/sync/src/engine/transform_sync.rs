use glam::{Quat, Vec3};

use crate::authority::{AuthorityGate, AuthorityMode, AuthorityState, LocalRole, PeerId};
use crate::codec::{Channel, HeaderFlags, SnapshotCodec};
use crate::config::{SyncConfig, TickSource};
use crate::error::SyncError;
use crate::event::SyncEvent;
use crate::net::{ChannelId, ControlMessage, Outgoing, Recipients, Transport};
use crate::physics::PhysicalBody;
use crate::snapshot::{Pose, SnapshotHistory, StateRecord};

use super::clock::ClockReconciler;
use super::interpolation::{Evaluation, Interpolator, MotionParams, Outcome, copy_channel};
use super::rest::{RestTracker, RestTransition};
use super::smoothing::{apply_target, freeze};

/// Accumulated timer error tolerated before a send is considered due.
const SEND_TIMER_SLACK: f32 = 1e-4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    pub local_time: f32,
    /// Current estimate of the authority clock; zero while sending.
    pub authority_time: f32,
    pub history_len: usize,
    pub records_accepted: u64,
    pub records_dropped: u64,
    pub messages_sent: u64,
    pub messages_discarded: u64,
    pub last_outcome: Option<Outcome>,
    pub extrapolation_failed: bool,
}

#[derive(Debug)]
struct Sender {
    send_timer: f32,
    previous_pose: Pose,
    position_rest: RestTracker,
    rotation_rest: RestTracker,
    rest_announced: bool,
    force_full: bool,
}

impl Sender {
    fn new(pose: Pose) -> Self {
        Self {
            send_timer: 0.0,
            previous_pose: pose,
            position_rest: RestTracker::default(),
            rotation_rest: RestTracker::default(),
            rest_announced: false,
            force_full: false,
        }
    }

    /// Restarts from a pose observers already hold exactly.
    fn anchor(&mut self, pose: Pose, rest_tick_count: u32) {
        self.send_timer = 0.0;
        self.previous_pose = pose;
        self.position_rest.settle(rest_tick_count);
        self.rotation_rest.settle(rest_tick_count);
        self.rest_announced = true;
        self.force_full = false;
    }

    fn at_rest(&self) -> bool {
        self.position_rest.at_rest() && self.rotation_rest.at_rest()
    }
}

#[derive(Debug)]
struct Receiver {
    history: SnapshotHistory,
    clock: ClockReconciler,
    codec: SnapshotCodec,
    interpolator: Interpolator,
    extrapolation_failed: bool,
}

impl Receiver {
    fn new(capacity: usize) -> Self {
        Self {
            history: SnapshotHistory::new(capacity),
            clock: ClockReconciler::new(),
            codec: SnapshotCodec::new(),
            interpolator: Interpolator::new(),
            extrapolation_failed: false,
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.clock.reset();
        self.codec.reset();
        self.interpolator.reset();
        self.extrapolation_failed = false;
    }
}

/// Synchronizes one entity's body between its authority and observers.
///
/// The same value works on both sides: with control it samples the body and
/// queues snapshots, without it it consumes snapshots and drives the body.
pub struct TransformSync<B: PhysicalBody> {
    config: SyncConfig,
    body: B,
    authority: AuthorityState,
    local_time: f32,
    sender: Sender,
    receiver: Receiver,
    outbox: Vec<Outgoing>,
    events: Vec<SyncEvent>,
    stats: SyncStats,
}

impl<B: PhysicalBody> TransformSync<B> {
    pub fn new(
        config: SyncConfig,
        body: B,
        role: LocalRole,
        owner: Option<PeerId>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let gate = AuthorityGate::new(config.authority_mode, role, owner);
        let pose = Pose::from_body(&body);
        log::debug!(
            "synchronizer created for peer {} (server: {}, control: {})",
            role.peer,
            role.is_server,
            gate.has_control()
        );

        Ok(Self {
            receiver: Receiver::new(config.history_capacity()),
            sender: Sender::new(pose),
            authority: AuthorityState::new(gate),
            config,
            body,
            local_time: 0.0,
            outbox: Vec::new(),
            events: Vec::new(),
            stats: SyncStats::default(),
        })
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn authority(&self) -> &AuthorityGate {
        &self.authority.gate
    }

    pub fn has_control(&self) -> bool {
        self.authority.has_control()
    }

    pub fn local_time(&self) -> f32 {
        self.local_time
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.receiver.history
    }

    /// Last state handed to the transport while in control.
    pub fn last_sent(&self) -> Option<&StateRecord> {
        self.authority.last_sent_record.as_ref()
    }

    /// Advances the synchronizer by `dt` seconds. Ticks from the source not
    /// selected in the configuration are ignored.
    pub fn tick(&mut self, dt: f32, source: TickSource) {
        if source != self.config.tick_source {
            return;
        }
        if !dt.is_finite() || dt <= 0.0 {
            log::trace!("ignoring tick with dt {dt}");
            return;
        }

        self.local_time += dt;
        if self.authority.has_control() {
            self.send_tick(dt);
        } else {
            self.observe_tick();
        }
    }

    /// Feeds a payload received from the network.
    ///
    /// Malformed payloads are counted, reported as an event and returned as
    /// errors; the synchronizer state is left untouched.
    pub fn receive(&mut self, channel: ChannelId, payload: &[u8]) -> Result<(), SyncError> {
        let result = match channel {
            ChannelId::State => self.receive_state(payload),
            ChannelId::Control => self.receive_control(payload),
        };

        if let Err(err) = &result {
            self.stats.messages_discarded += 1;
            log::warn!("discarding {channel:?} message: {err}");
            self.events.push(SyncEvent::MessageDiscarded {
                channel,
                reason: err.to_string(),
            });
        }
        result
    }

    /// Moves the body instantly; observers jump instead of blending.
    pub fn teleport(&mut self, position: Vec3, rotation: Quat, scale: Vec3) -> Result<(), SyncError> {
        if !self.authority.has_control() {
            return Err(SyncError::NotAuthority {
                operation: "teleport",
            });
        }

        self.body.set_position(position);
        self.body.set_rotation(rotation);
        self.body.set_scale(scale);
        let pose = Pose::from_body(&self.body);

        self.broadcast_teleport(pose)?;
        log::debug!("teleported to {position}");
        self.events.push(SyncEvent::Teleported { pose });
        Ok(())
    }

    pub fn set_authority_mode(&mut self, mode: AuthorityMode) {
        self.config.authority_mode = mode;
        if self.authority.gate.set_mode(mode) {
            let pose = Pose::from_body(&self.body);
            self.control_changed(pose);
        }
    }

    /// Hands the entity to `new_owner`; only the server may do this.
    pub fn transfer_ownership(&mut self, new_owner: Option<PeerId>) -> Result<(), SyncError> {
        if !self.authority.gate.is_server() {
            return Err(SyncError::NotAuthority {
                operation: "transfer_ownership",
            });
        }

        let pose = Pose::from_body(&self.body);
        let payload = ControlMessage::ownership_transfer(new_owner, pose).serialize()?;
        self.outbox
            .push(Outgoing::new(ChannelId::Control, Recipients::Observers, payload));

        log::info!("ownership transferred to {new_owner:?}");
        if self.authority.gate.set_owner(new_owner) {
            self.control_changed(pose);
        }
        Ok(())
    }

    /// Applies a new configuration, resizing history to match.
    pub fn reconfigure(&mut self, config: SyncConfig) -> Result<(), SyncError> {
        config.validate()?;

        let mode = config.authority_mode;
        self.receiver.history.set_capacity(config.history_capacity());
        self.config = config;
        self.set_authority_mode(mode);
        log::debug!("reconfigured, history capacity {}", self.receiver.history.capacity());
        Ok(())
    }

    /// Sends every enabled channel on the next send, even while resting.
    pub fn force_full_send(&mut self) {
        self.sender.force_full = true;
    }

    /// Forgets everything received so far.
    pub fn clear_history(&mut self) {
        self.receiver.reset();
    }

    pub fn drain_outgoing(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    pub fn flush<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        for message in self.outbox.drain(..) {
            transport.send(message);
        }
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn stats(&self) -> SyncStats {
        let authority_time = if self.authority.has_control() {
            0.0
        } else {
            self.receiver.clock.authority_time(self.local_time)
        };
        SyncStats {
            local_time: self.local_time,
            authority_time,
            history_len: self.receiver.history.len(),
            extrapolation_failed: self.receiver.extrapolation_failed,
            ..self.stats.clone()
        }
    }

    fn send_tick(&mut self, dt: f32) {
        let pose = Pose::from_body(&self.body);
        let previous = self.sender.previous_pose;
        let rest_ticks = self.config.rest_tick_count;

        let position = &self.config.position;
        let moved_position = position.is_enabled()
            && position.axes.distance(previous.position, pose.position) > position.send_threshold;
        let rotation = &self.config.rotation;
        let moved_rotation = rotation.is_enabled()
            && previous.rotation.angle_between(pose.rotation).to_degrees() > rotation.send_threshold;

        let resumed = [
            self.sender.position_rest.observe(moved_position, rest_ticks),
            self.sender.rotation_rest.observe(moved_rotation, rest_ticks),
        ]
        .contains(&RestTransition::Resumed);
        self.sender.previous_pose = pose;

        if resumed && self.sender.rest_announced {
            // Observers are holding the resting pose; give them the point
            // motion started from before anything newer.
            log::debug!("motion resumed at {}", self.local_time);
            self.sender.rest_announced = false;
            self.sender.send_timer = 0.0;
            let record = self.record(previous, self.local_time - dt);
            self.send(record, HeaderFlags::CHANNELS);
            return;
        }

        self.sender.send_timer += dt;

        if self.sender.at_rest() {
            if !self.sender.rest_announced {
                log::debug!("came to rest at {}", self.local_time);
                self.sender.rest_announced = true;
                self.sender.send_timer = 0.0;
                self.send(self.record(pose, self.local_time), HeaderFlags::CHANNELS);
            } else if self.sender.force_full {
                self.send(self.record(pose, self.local_time), HeaderFlags::CHANNELS);
            }
            return;
        }

        let interval = self.config.send_interval();
        if self.sender.force_full || self.sender.send_timer + SEND_TIMER_SLACK >= interval {
            self.sender.send_timer = (self.sender.send_timer - interval).clamp(0.0, interval);
            let channels = if self.sender.force_full {
                HeaderFlags::CHANNELS
            } else {
                self.changed_channels(&pose)
            };
            self.send(self.record(pose, self.local_time), channels);
        }
    }

    fn record(&self, pose: Pose, timestamp: f32) -> StateRecord {
        StateRecord {
            at_positional_rest: self.sender.position_rest.at_rest(),
            at_rotational_rest: self.sender.rotation_rest.at_rest(),
            ..StateRecord::new(pose, timestamp)
        }
    }

    fn changed_channels(&self, pose: &Pose) -> HeaderFlags {
        let Some(last) = &self.authority.last_sent_record else {
            return HeaderFlags::CHANNELS;
        };

        let mut channels = HeaderFlags::empty();
        for channel in Channel::ALL {
            let settings = self.config.channel(channel);
            if !settings.is_enabled() {
                continue;
            }
            let change = match channel {
                Channel::Position => settings.axes.distance(last.pose.position, pose.position),
                Channel::Rotation => last.pose.rotation.angle_between(pose.rotation).to_degrees(),
                Channel::Scale => settings.axes.distance(last.pose.scale, pose.scale),
                Channel::Velocity => settings.axes.distance(last.pose.velocity, pose.velocity),
                Channel::AngularVelocity => settings
                    .axes
                    .distance(last.pose.angular_velocity, pose.angular_velocity),
            };
            if change > settings.send_threshold {
                channels |= channel.flag();
            }
        }
        channels
    }

    fn send(&mut self, record: StateRecord, channels: HeaderFlags) {
        let payload = SnapshotCodec::encode(&record, channels, &self.config);

        // Remember only what actually went out, so slow drift below the send
        // threshold still accumulates into a send eventually.
        let mut sent = self.authority.last_sent_record.unwrap_or(record);
        for channel in Channel::ALL {
            if channels.contains(channel.flag()) {
                copy_channel(&mut sent.pose, &record.pose, channel);
            }
        }
        sent.authority_timestamp = record.authority_timestamp;
        sent.at_positional_rest = record.at_positional_rest;
        sent.at_rotational_rest = record.at_rotational_rest;

        self.authority.last_sent_record = Some(sent);
        self.authority.last_sent_time = self.local_time;
        self.sender.force_full = false;
        self.stats.messages_sent += 1;

        let recipients = self.recipients();
        self.outbox
            .push(Outgoing::new(ChannelId::State, recipients, payload));
    }

    fn recipients(&self) -> Recipients {
        if self.authority.gate.is_server() {
            Recipients::Observers
        } else {
            Recipients::Server
        }
    }

    fn observe_tick(&mut self) {
        let target_time =
            self.receiver.clock.authority_time(self.local_time) - self.config.interpolation_delay;
        let motion = MotionParams::from_body(&self.body, &self.config);

        let evaluation = self.receiver.interpolator.evaluate(
            &self.receiver.history,
            target_time,
            &self.config,
            &motion,
        );

        match evaluation {
            Evaluation::Empty => {}
            Evaluation::Target(target) => {
                if self.receiver.extrapolation_failed {
                    log::debug!("extrapolation recovered");
                    self.receiver.extrapolation_failed = false;
                }
                self.stats.last_outcome = Some(target.outcome);

                let written = apply_target(&mut self.body, &target, &self.config);
                if !written.is_empty() {
                    self.events.push(SyncEvent::StateApplied {
                        pose: Pose::from_body(&self.body),
                        outcome: target.outcome,
                    });
                }
            }
            Evaluation::ExtrapolationFailed => {
                freeze(&mut self.body);
                if !self.receiver.extrapolation_failed {
                    log::warn!(
                        "extrapolation limit reached at {target_time:.3}, stopping body"
                    );
                    self.receiver.extrapolation_failed = true;
                    self.events.push(SyncEvent::ExtrapolationFailed);
                }
            }
        }
    }

    fn receive_state(&mut self, payload: &[u8]) -> Result<(), SyncError> {
        if self.authority.has_control() {
            log::trace!("ignoring state for an entity under local control");
            return Ok(());
        }

        let fallback = self
            .receiver
            .history
            .newest()
            .map_or_else(|| Pose::from_body(&self.body), |newest| newest.pose);
        let record =
            self.receiver
                .codec
                .decode(payload, &self.config, &fallback, self.local_time)?;

        if self.receiver.history.insert(record) {
            self.receiver
                .clock
                .observe(&record, self.local_time, &self.config);
            self.stats.records_accepted += 1;
            self.relay(ChannelId::State, payload);
        } else {
            self.stats.records_dropped += 1;
        }
        Ok(())
    }

    fn receive_control(&mut self, payload: &[u8]) -> Result<(), SyncError> {
        match ControlMessage::deserialize(payload)? {
            ControlMessage::Teleport { pose, timestamp } => {
                // Teleports only ever come from the side in control.
                if self.authority.has_control() {
                    return Err(SyncError::NotAuthority {
                        operation: "teleport",
                    });
                }
                let pose = Pose::from(pose);
                self.store_teleport(pose, timestamp);
                self.relay(ChannelId::Control, payload);
                self.events.push(SyncEvent::Teleported { pose });
            }
            ControlMessage::OwnershipTransfer { new_owner, pose } => {
                // Ownership is decided by the server, never by its peers.
                if self.authority.gate.is_server() {
                    return Err(SyncError::NotAuthority {
                        operation: "transfer_ownership",
                    });
                }
                let pose = Pose::from(pose);
                log::debug!("ownership moved to {new_owner:?}");
                let changed = self.authority.gate.set_owner(new_owner);

                // The authority clock changes hands, so start over either way.
                self.receiver.reset();
                if self.authority.has_control() {
                    self.apply_pose(&pose);
                    self.broadcast_teleport(pose)?;
                } else {
                    self.authority.forget_sent();
                    self.receiver
                        .history
                        .insert_teleport(StateRecord::teleport(pose, 0.0, self.local_time));
                }

                if changed {
                    self.announce_control();
                }
            }
        }
        Ok(())
    }

    fn store_teleport(&mut self, pose: Pose, timestamp: f32) {
        let record = StateRecord::teleport(pose, timestamp, self.local_time);
        self.receiver.history.insert_teleport(record);

        let is_newest = self
            .receiver
            .history
            .newest()
            .is_some_and(|newest| newest.is_teleport && newest.authority_timestamp == timestamp);
        if is_newest {
            self.receiver
                .clock
                .observe(&record, self.local_time, &self.config);
        }
    }

    fn broadcast_teleport(&mut self, pose: Pose) -> Result<(), SyncError> {
        let payload = ControlMessage::teleport(pose, self.local_time).serialize()?;
        let recipients = self.recipients();
        self.outbox
            .push(Outgoing::new(ChannelId::Control, recipients, payload));

        self.authority.last_sent_record =
            Some(StateRecord::teleport(pose, self.local_time, self.local_time));
        self.authority.last_sent_time = self.local_time;
        self.sender.anchor(pose, self.config.rest_tick_count);
        Ok(())
    }

    /// The server forwards what an owning client sends to everyone else.
    fn relay(&mut self, channel: ChannelId, payload: &[u8]) {
        if self.authority.gate.is_server() {
            self.outbox.push(Outgoing::new(
                channel,
                Recipients::Observers,
                bytes::Bytes::copy_from_slice(payload),
            ));
        }
    }

    fn apply_pose(&mut self, pose: &Pose) {
        self.body.set_position(pose.position);
        self.body.set_rotation(pose.rotation);
        self.body.set_scale(pose.scale);
        self.body.set_velocity(pose.velocity);
        self.body.set_angular_velocity(pose.angular_velocity);
    }

    fn control_changed(&mut self, pose: Pose) {
        self.receiver.reset();
        if self.authority.has_control() {
            self.authority.forget_sent();
            self.sender = Sender::new(pose);
        } else {
            self.authority.forget_sent();
            self.receiver
                .history
                .insert_teleport(StateRecord::teleport(pose, 0.0, self.local_time));
        }
        self.announce_control();
    }

    fn announce_control(&mut self) {
        let has_control = self.authority.has_control();
        log::info!("local control is now {has_control}");
        self.events.push(SyncEvent::AuthorityChanged { has_control });
    }
}
