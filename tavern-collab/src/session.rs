use log::{debug, info};

use crate::{
    Audience, CollabEvent, ConnectionHandle, ConnectionId, ConnectionRegistry, Identity,
    RoomExit, RoomPresence, UserId, VoiceChannels,
};

/// All connection, presence and voice state, mutated as one unit.
#[derive(Debug, Default)]
pub struct SessionState {
    pub(crate) registry: ConnectionRegistry,
    pub(crate) presence: RoomPresence,
    pub(crate) voice: VoiceChannels,
}

impl SessionState {
    /// Registers a connection. An existing connection for the same user is told it was
    /// superseded and fully cleaned up first.
    pub fn connect(
        &mut self,
        identity: Identity,
        handle: ConnectionHandle,
    ) -> (ConnectionId, Option<RoomExit>) {
        let user_id = identity.id;

        let exit = match self.registry.lookup(user_id).cloned() {
            Some(previous) => {
                info!("User {} reconnected, superseding old connection", identity.username);
                previous.send(CollabEvent::SessionSuperseded);
                self.disconnect(user_id, None)
            }
            None => None,
        };

        let (connection_id, _) = self.registry.register(identity.clone(), handle);

        info!("User {} ({}) connected", identity.username, identity.role.as_str());
        self.broadcast(
            Audience::Everyone.except(user_id),
            CollabEvent::UserOnline { user: identity },
        );

        (connection_id, exit)
    }

    /// Tears down everything a user holds. Safe to call any number of times.
    ///
    /// When `connection_id` is given and no longer matches the registered connection,
    /// the call belongs to a superseded connection and nothing happens.
    pub fn disconnect(
        &mut self,
        user_id: UserId,
        connection_id: Option<ConnectionId>,
    ) -> Option<RoomExit> {
        let current = self.registry.connection_id(user_id);

        if let (Some(current), Some(stale)) = (current, connection_id) {
            if current != stale {
                debug!("Ignoring disconnect of superseded connection {}", stale);
                return None;
            }
        }

        // Voice participation in any room goes, not just the current one
        self.leave_all_voice(user_id);
        let exit = self.leave_side_effects(user_id);

        if let Some(connection) = self.registry.unregister(user_id) {
            info!("User {} disconnected", connection.identity.username);

            self.broadcast(
                Audience::Everyone,
                CollabEvent::UserOffline {
                    user: connection.identity,
                },
            );
        }

        exit
    }

    pub fn identity(&self, user_id: UserId) -> Option<&Identity> {
        self.registry.identity(user_id)
    }
}
