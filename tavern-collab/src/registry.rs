use std::collections::HashMap;

use tavern_core::Id;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{CollabEvent, Identity, UserId};

pub type ConnectionId = Id<Connection>;
pub type EventReceiver = UnboundedReceiver<CollabEvent>;

/// Pushes events to a single live connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    sender: UnboundedSender<CollabEvent>,
}

/// A live, authenticated connection
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    handle: ConnectionHandle,
}

/// Tracks the one live connection of every connected user.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<UserId, Connection>,
}

impl ConnectionHandle {
    /// Creates a handle, and the receiver the transport reads outbound events from.
    pub fn new() -> (Self, EventReceiver) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Sends an event, returning false if the connection is already gone.
    pub fn send(&self, event: CollabEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

impl ConnectionRegistry {
    /// Registers a connection, replacing and returning any previous one for the same user.
    pub fn register(
        &mut self,
        identity: Identity,
        handle: ConnectionHandle,
    ) -> (ConnectionId, Option<Connection>) {
        let id = ConnectionId::new();
        let previous = self.connections.insert(
            identity.id,
            Connection {
                id,
                identity,
                handle,
            },
        );

        (id, previous)
    }

    pub fn lookup(&self, user_id: UserId) -> Option<&ConnectionHandle> {
        self.connections.get(&user_id).map(|c| &c.handle)
    }

    pub fn identity(&self, user_id: UserId) -> Option<&Identity> {
        self.connections.get(&user_id).map(|c| &c.identity)
    }

    pub fn connection_id(&self, user_id: UserId) -> Option<ConnectionId> {
        self.connections.get(&user_id).map(|c| c.id)
    }

    pub fn unregister(&mut self, user_id: UserId) -> Option<Connection> {
        self.connections.remove(&user_id)
    }

    /// Returns the identities of everyone connected, ordered by user id
    pub fn online(&self) -> Vec<Identity> {
        let mut identities: Vec<_> = self
            .connections
            .values()
            .map(|c| c.identity.clone())
            .collect();

        identities.sort_by_key(|i| i.id);
        identities
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.connections.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
