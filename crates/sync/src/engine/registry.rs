use std::collections::HashMap;

use crate::config::TickSource;
use crate::error::SyncError;
use crate::event::SyncEvent;
use crate::net::{ChannelId, Outgoing, Transport};
use crate::physics::PhysicalBody;

use super::transform_sync::TransformSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

/// All synchronized entities of one peer, addressed by id.
///
/// A bad payload for one entity never affects another.
pub struct SyncRegistry<B: PhysicalBody> {
    entities: HashMap<EntityId, TransformSync<B>>,
}

impl<B: PhysicalBody> Default for SyncRegistry<B> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }
}

impl<B: PhysicalBody> SyncRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: EntityId, sync: TransformSync<B>) -> Option<TransformSync<B>> {
        log::debug!("registering entity {}", id.0);
        self.entities.insert(id, sync)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<TransformSync<B>> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&TransformSync<B>> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut TransformSync<B>> {
        self.entities.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn tick(&mut self, dt: f32, source: TickSource) {
        for sync in self.entities.values_mut() {
            sync.tick(dt, source);
        }
    }

    /// Routes a payload to its entity.
    pub fn receive(
        &mut self,
        id: EntityId,
        channel: ChannelId,
        payload: &[u8],
    ) -> Result<(), SyncError> {
        let Some(sync) = self.entities.get_mut(&id) else {
            log::warn!("payload for unknown entity {}", id.0);
            return Err(SyncError::UnknownEntity(id.0));
        };
        sync.receive(channel, payload)
    }

    /// Outgoing payloads of every entity, sorted by entity id.
    pub fn drain_outgoing(&mut self) -> Vec<(EntityId, Outgoing)> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();

        let mut out = Vec::new();
        for id in ids {
            if let Some(sync) = self.entities.get_mut(&id) {
                out.extend(sync.drain_outgoing().into_iter().map(|m| (id, m)));
            }
        }
        out
    }

    /// Hands every queued payload to `transport`, tagged with its entity.
    pub fn flush<T: Transport<(EntityId, Outgoing)> + ?Sized>(&mut self, transport: &mut T) {
        for message in self.drain_outgoing() {
            transport.send(message);
        }
    }

    pub fn drain_events(&mut self) -> Vec<(EntityId, SyncEvent)> {
        let mut events = Vec::new();
        for (&id, sync) in self.entities.iter_mut() {
            events.extend(sync.drain_events().into_iter().map(|e| (id, e)));
        }
        events.sort_by_key(|(id, _)| *id);
        events
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::authority::LocalRole;
    use crate::codec::{HeaderFlags, SnapshotCodec};
    use crate::config::SyncConfig;
    use crate::physics::TransformBody;
    use crate::snapshot::{Pose, StateRecord};

    fn observer() -> TransformSync<TransformBody> {
        TransformSync::new(
            SyncConfig::default(),
            TransformBody::default(),
            LocalRole::client(1),
            None,
        )
        .unwrap()
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let mut registry: SyncRegistry<TransformBody> = SyncRegistry::new();
        assert!(matches!(
            registry.receive(EntityId(9), ChannelId::State, &[]),
            Err(SyncError::UnknownEntity(9))
        ));
    }

    #[test]
    fn bad_payload_stays_with_its_entity() {
        let mut registry = SyncRegistry::new();
        registry.insert(EntityId(1), observer());
        registry.insert(EntityId(2), observer());

        let config = SyncConfig::default();
        let good = SnapshotCodec::encode(
            &StateRecord::new(
                Pose {
                    position: Vec3::new(4.0, 0.0, 0.0),
                    ..Default::default()
                },
                1.0,
            ),
            HeaderFlags::CHANNELS,
            &config,
        );

        assert!(registry.receive(EntityId(1), ChannelId::State, &good[..3]).is_err());
        registry.receive(EntityId(2), ChannelId::State, &good).unwrap();

        assert!(registry.get(EntityId(1)).unwrap().history().is_empty());
        assert_eq!(registry.get(EntityId(2)).unwrap().history().len(), 1);
    }

    #[test]
    fn outgoing_is_tagged_by_entity() {
        let mut registry = SyncRegistry::new();
        for id in [3, 1] {
            let sync = TransformSync::new(
                SyncConfig::default(),
                TransformBody::default(),
                LocalRole::server(0),
                None,
            )
            .unwrap();
            registry.insert(EntityId(id), sync);
        }

        registry.tick(1.0 / 30.0, TickSource::Render);
        let mut wire: Vec<(EntityId, Outgoing)> = Vec::new();
        registry.flush(&mut wire);

        let ids: Vec<u32> = wire.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
