use std::collections::VecDeque;

use super::protocol::Outgoing;

/// Host-side sink for queued payloads.
///
/// The engine never touches sockets; whoever owns the connection drains the
/// outbox into an implementation of this trait.
pub trait Transport<M = Outgoing> {
    fn send(&mut self, message: M);
}

impl<M> Transport<M> for Vec<M> {
    fn send(&mut self, message: M) {
        self.push(message);
    }
}

impl<M> Transport<M> for VecDeque<M> {
    fn send(&mut self, message: M) {
        self.push_back(message);
    }
}
