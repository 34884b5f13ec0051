use std::collections::{BTreeMap, HashMap};

use log::info;
use tavern_core::RoomId;

use crate::{Audience, CollabError, CollabEvent, CollabResult, Identity, SessionState, UserId};

/// Tracks which room each user is in, and who is in each room.
#[derive(Debug, Default)]
pub struct RoomPresence {
    rooms_by_user: HashMap<UserId, RoomId>,
    members: HashMap<RoomId, BTreeMap<UserId, Identity>>,
}

/// A user leaving a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomExit {
    pub room_id: RoomId,
    /// Whether the room has no members left
    pub emptied: bool,
}

/// The result of a successful room join
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRoom {
    /// Everyone in the room, including the user who joined
    pub users: Vec<Identity>,
    /// The room the user was in before, if any
    pub left: Option<RoomExit>,
}

impl RoomPresence {
    pub fn room_of(&self, user_id: UserId) -> Option<RoomId> {
        self.rooms_by_user.get(&user_id).copied()
    }

    pub fn members(&self, room_id: RoomId) -> Vec<UserId> {
        self.members
            .get(&room_id)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn identities(&self, room_id: RoomId) -> Vec<Identity> {
        self.members
            .get(&room_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    fn enter(&mut self, identity: Identity, room_id: RoomId) {
        self.rooms_by_user.insert(identity.id, room_id);
        self.members
            .entry(room_id)
            .or_default()
            .insert(identity.id, identity);
    }

    fn exit(&mut self, user_id: UserId) -> Option<(RoomExit, Identity)> {
        let room_id = self.rooms_by_user.remove(&user_id)?;
        let members = self.members.get_mut(&room_id)?;
        let identity = members.remove(&user_id)?;

        let emptied = members.is_empty();
        if emptied {
            self.members.remove(&room_id);
        }

        Some((RoomExit { room_id, emptied }, identity))
    }
}

impl SessionState {
    /// Moves a user into a room, leaving their previous room first. Joining the current room is a no-op.
    pub fn join_room(&mut self, user_id: UserId, room_id: RoomId) -> CollabResult<JoinedRoom> {
        let identity = self
            .registry
            .identity(user_id)
            .cloned()
            .ok_or(CollabError::NotConnected(user_id))?;

        if self.presence.room_of(user_id) == Some(room_id) {
            return Ok(JoinedRoom {
                users: self.presence.identities(room_id),
                left: None,
            });
        }

        let left = self.leave_side_effects(user_id);

        info!("User {} joined room {}", identity.username, room_id);
        self.presence.enter(identity.clone(), room_id);

        self.broadcast(
            Audience::Room(room_id).except(user_id),
            CollabEvent::UserJoinedRoom {
                room_id,
                user: identity,
            },
        );

        Ok(JoinedRoom {
            users: self.presence.identities(room_id),
            left,
        })
    }

    /// Moves a user back to the global space. No-op if they are not in a room.
    pub fn leave_room(&mut self, user_id: UserId) -> Option<RoomExit> {
        self.leave_side_effects(user_id)
    }

    pub fn room_users(&self, room_id: RoomId) -> Vec<Identity> {
        self.presence.identities(room_id)
    }

    pub fn room_of(&self, user_id: UserId) -> Option<RoomId> {
        self.presence.room_of(user_id)
    }

    /// Leaves the room's voice channel, removes the user from the room and tells the rest of the room.
    pub(crate) fn leave_side_effects(&mut self, user_id: UserId) -> Option<RoomExit> {
        let room_id = self.presence.room_of(user_id)?;

        self.auto_leave_voice_for_room_change(user_id, room_id);

        let (exit, identity) = self.presence.exit(user_id)?;
        info!("User {} left room {}", identity.username, room_id);

        self.broadcast(
            Audience::Room(room_id),
            CollabEvent::UserLeftRoom {
                room_id,
                user: identity,
            },
        );

        Some(exit)
    }
}
