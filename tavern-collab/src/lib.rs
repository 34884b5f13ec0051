mod auth;
mod broadcast;
mod chat;
mod error;
mod events;
mod identity;
mod input;
mod locator;
mod music;
mod presence;
mod registry;
mod session;
mod signaling;
mod util;
mod voice;

#[cfg(test)]
mod test_util;

use std::sync::Arc;

pub use auth::*;
pub use broadcast::*;
pub use chat::*;
pub use error::*;
pub use events::*;
pub use identity::*;
pub use input::*;
pub use locator::*;
pub use music::*;
pub use presence::*;
pub use registry::*;
pub use session::*;
pub use signaling::*;
pub use voice::*;

use log::info;
use parking_lot::Mutex;
use serde_json::Value;
use tavern_core::{Config, PlaybackEngine, PlaybackSnapshot, RoomId, Scope, SharedClock};

/// The tavern session coordinator.
///
/// Owns every connection, room, voice channel and playback state of the process.
/// Connection, presence and voice changes happen under one lock, and always before playback is touched.
pub struct Collab {
    config: Config,
    session: Mutex<SessionState>,
    playback: PlaybackEngine,
    inputs: Arc<dyn MediaInputs>,
    locators: LocatorCache,
}

/// A registered connection, and the events meant for it
#[derive(Debug)]
pub struct CollabConnection {
    pub id: ConnectionId,
    pub identity: Identity,
    pub events: EventReceiver,
}

impl Collab {
    pub fn new(config: Config, clock: SharedClock, inputs: Arc<dyn MediaInputs>) -> Self {
        Self {
            locators: LocatorCache::new(config.locator_ttl()),
            playback: PlaybackEngine::new(config.clone(), clock),
            session: Default::default(),
            config,
            inputs,
        }
    }

    /// Registers an authenticated connection, superseding any previous one of the same user.
    pub fn connect(&self, identity: Identity) -> CollabConnection {
        let (handle, events) = ConnectionHandle::new();

        let mut session = self.session.lock();
        let (id, exit) = session.connect(identity.clone(), handle);
        self.after_room_exit(exit);

        CollabConnection {
            id,
            identity,
            events,
        }
    }

    /// Cleans up after a connection. Calling this more than once, or for a superseded connection, does nothing.
    pub fn disconnect(&self, user_id: UserId, connection_id: Option<ConnectionId>) {
        let mut session = self.session.lock();
        let exit = session.disconnect(user_id, connection_id);
        self.after_room_exit(exit);
    }

    pub fn join_room(&self, user_id: UserId, room_id: RoomId) -> CollabResult<JoinedRoom> {
        let mut session = self.session.lock();
        let joined = session.join_room(user_id, room_id)?;
        self.after_room_exit(joined.left);

        Ok(joined)
    }

    pub fn leave_room(&self, user_id: UserId) -> Option<RoomExit> {
        let mut session = self.session.lock();
        let exit = session.leave_room(user_id);
        self.after_room_exit(exit);

        exit
    }

    /// Returns true if the connection is still the one registered for its user.
    pub fn is_current(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        self.session.lock().registry.connection_id(user_id) == Some(connection_id)
    }

    pub fn room_users(&self, room_id: RoomId) -> Vec<Identity> {
        self.session.lock().room_users(room_id)
    }

    pub fn room_of(&self, user_id: UserId) -> Option<RoomId> {
        self.session.lock().room_of(user_id)
    }

    pub fn online_users(&self) -> Vec<Identity> {
        self.session.lock().registry.online()
    }

    pub fn voice_join(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> CollabResult<Vec<VoiceParticipant>> {
        self.session.lock().join_voice(user_id, room_id)
    }

    pub fn voice_leave(&self, user_id: UserId, room_id: RoomId) -> bool {
        self.session.lock().leave_voice(user_id, room_id)
    }

    pub fn voice_set_muted(&self, user_id: UserId, room_id: RoomId, is_muted: bool) -> CollabResult<()> {
        self.session.lock().set_mute(user_id, room_id, is_muted)
    }

    pub fn voice_set_speaking(
        &self,
        user_id: UserId,
        room_id: RoomId,
        is_speaking: bool,
    ) -> CollabResult<()> {
        self.session.lock().set_speaking(user_id, room_id, is_speaking)
    }

    pub fn voice_participants(&self, room_id: RoomId) -> Vec<VoiceParticipant> {
        self.session.lock().voice_participants(room_id)
    }

    pub fn relay_signal(
        &self,
        from_user_id: UserId,
        to_user_id: UserId,
        kind: SignalKind,
        payload: Value,
    ) -> CollabResult<()> {
        self.session
            .lock()
            .relay(from_user_id, to_user_id, kind, payload)
    }

    pub fn playback_snapshot(&self, scope: Scope) -> Option<PlaybackSnapshot> {
        self.playback.snapshot(scope)
    }

    /// Drops the playback state of a room that just emptied, if it has nothing to play.
    /// Runs with the session locked.
    fn after_room_exit(&self, exit: Option<RoomExit>) {
        let Some(exit) = exit else {
            return;
        };

        if exit.emptied
            && self.config.evict_idle_room_playback
            && self.playback.evict_if_idle(exit.room_id)
        {
            info!("Room {} is empty, dropped its playback state", exit.room_id);
        }
    }
}
