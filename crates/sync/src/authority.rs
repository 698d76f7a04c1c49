use serde::{Deserialize, Serialize};

use crate::snapshot::StateRecord;

pub type PeerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthorityMode {
    /// The owning connection sends state; the server does when there is no owner.
    #[default]
    OwnerAuthority,
    /// The server always sends state.
    ServerAuthority,
}

/// Who this process is on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalRole {
    pub peer: PeerId,
    pub is_server: bool,
}

impl LocalRole {
    pub fn server(peer: PeerId) -> Self {
        Self {
            peer,
            is_server: true,
        }
    }

    pub fn client(peer: PeerId) -> Self {
        Self {
            peer,
            is_server: false,
        }
    }
}

/// Decides whether the local process is the one sending state for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityGate {
    mode: AuthorityMode,
    role: LocalRole,
    owner: Option<PeerId>,
}

impl AuthorityGate {
    pub fn new(mode: AuthorityMode, role: LocalRole, owner: Option<PeerId>) -> Self {
        Self { mode, role, owner }
    }

    pub fn mode(&self) -> AuthorityMode {
        self.mode
    }

    pub fn role(&self) -> LocalRole {
        self.role
    }

    pub fn owner(&self) -> Option<PeerId> {
        self.owner
    }

    pub fn is_server(&self) -> bool {
        self.role.is_server
    }

    pub fn is_owner(&self) -> bool {
        self.owner == Some(self.role.peer)
    }

    pub fn has_control(&self) -> bool {
        match self.mode {
            AuthorityMode::OwnerAuthority => {
                self.is_owner() || (self.role.is_server && self.owner.is_none())
            }
            AuthorityMode::ServerAuthority => self.role.is_server,
        }
    }

    /// Returns whether control changed.
    pub fn set_mode(&mut self, mode: AuthorityMode) -> bool {
        let before = self.has_control();
        self.mode = mode;
        before != self.has_control()
    }

    /// Returns whether control changed.
    pub fn set_owner(&mut self, owner: Option<PeerId>) -> bool {
        let before = self.has_control();
        self.owner = owner;
        before != self.has_control()
    }
}

/// Authority bookkeeping for one entity.
#[derive(Debug, Clone)]
pub struct AuthorityState {
    pub gate: AuthorityGate,
    pub last_sent_record: Option<StateRecord>,
    pub last_sent_time: f32,
}

impl AuthorityState {
    pub fn new(gate: AuthorityGate) -> Self {
        Self {
            gate,
            last_sent_record: None,
            last_sent_time: 0.0,
        }
    }

    pub fn has_control(&self) -> bool {
        self.gate.has_control()
    }

    pub fn forget_sent(&mut self) {
        self.last_sent_record = None;
    }
}
