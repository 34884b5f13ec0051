use std::collections::HashMap;

use log::{debug, info};
use tavern_core::RoomId;

use crate::{Audience, CollabError, CollabEvent, CollabResult, Identity, Role, SessionState, UserId};

/// A user in a room's voice channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceParticipant {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub is_muted: bool,
    pub is_speaking: bool,
}

/// The voice channel of every room, in join order.
#[derive(Debug, Default)]
pub struct VoiceChannels {
    channels: HashMap<RoomId, Vec<VoiceParticipant>>,
}

impl VoiceParticipant {
    fn new(room_id: RoomId, identity: &Identity) -> Self {
        Self {
            room_id,
            user_id: identity.id,
            username: identity.username.clone(),
            role: identity.role,
            is_muted: false,
            is_speaking: false,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.user_id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

impl VoiceChannels {
    pub fn participants(&self, room_id: RoomId) -> Vec<VoiceParticipant> {
        self.channels.get(&room_id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, room_id: RoomId, user_id: UserId) -> bool {
        self.channels
            .get(&room_id)
            .is_some_and(|c| c.iter().any(|p| p.user_id == user_id))
    }

    /// Returns every room whose voice channel the user is in
    pub fn rooms_of(&self, user_id: UserId) -> Vec<RoomId> {
        let mut rooms: Vec<_> = self
            .channels
            .iter()
            .filter(|(_, c)| c.iter().any(|p| p.user_id == user_id))
            .map(|(room_id, _)| *room_id)
            .collect();

        rooms.sort();
        rooms
    }

    fn add(&mut self, participant: VoiceParticipant) {
        self.channels
            .entry(participant.room_id)
            .or_default()
            .push(participant);
    }

    fn remove(&mut self, room_id: RoomId, user_id: UserId) -> Option<VoiceParticipant> {
        let channel = self.channels.get_mut(&room_id)?;
        let index = channel.iter().position(|p| p.user_id == user_id)?;
        let participant = channel.remove(index);

        if channel.is_empty() {
            self.channels.remove(&room_id);
        }

        Some(participant)
    }

    fn get_mut(&mut self, room_id: RoomId, user_id: UserId) -> Option<&mut VoiceParticipant> {
        self.channels
            .get_mut(&room_id)?
            .iter_mut()
            .find(|p| p.user_id == user_id)
    }
}

impl SessionState {
    /// Adds a user to a room's voice channel.
    ///
    /// Returns the participants that were already there, so the new participant can call each of them.
    pub fn join_voice(
        &mut self,
        user_id: UserId,
        room_id: RoomId,
    ) -> CollabResult<Vec<VoiceParticipant>> {
        let identity = self
            .registry
            .identity(user_id)
            .cloned()
            .ok_or(CollabError::NotConnected(user_id))?;

        if self.presence.room_of(user_id) != Some(room_id) {
            return Err(CollabError::NotInRoom);
        }

        if self.voice.contains(room_id, user_id) {
            return Err(CollabError::AlreadyInVoice);
        }

        let existing = self.voice.participants(room_id);
        let participant = VoiceParticipant::new(room_id, &identity);

        self.voice.add(participant.clone());
        info!("User {} joined voice in room {}", identity.username, room_id);

        self.broadcast(
            Audience::Room(room_id).except(user_id),
            CollabEvent::VoiceUserJoined {
                room_id,
                participant,
            },
        );

        Ok(existing)
    }

    /// Removes a user from a room's voice channel. Returns false if they were not in it.
    pub fn leave_voice(&mut self, user_id: UserId, room_id: RoomId) -> bool {
        let Some(participant) = self.voice.remove(room_id, user_id) else {
            return false;
        };

        info!("User {} left voice in room {}", participant.username, room_id);

        self.broadcast(
            Audience::Room(room_id).except(user_id),
            CollabEvent::VoiceUserLeft {
                room_id,
                user: participant.identity(),
            },
        );

        true
    }

    pub fn set_mute(&mut self, user_id: UserId, room_id: RoomId, is_muted: bool) -> CollabResult<()> {
        let participant = self
            .voice
            .get_mut(room_id, user_id)
            .ok_or(CollabError::NotInVoice)?;

        participant.is_muted = is_muted;

        self.broadcast(
            Audience::Room(room_id).except(user_id),
            CollabEvent::VoiceStateChanged {
                room_id,
                user_id,
                is_muted,
            },
        );

        Ok(())
    }

    pub fn set_speaking(
        &mut self,
        user_id: UserId,
        room_id: RoomId,
        is_speaking: bool,
    ) -> CollabResult<()> {
        let participant = self
            .voice
            .get_mut(room_id, user_id)
            .ok_or(CollabError::NotInVoice)?;

        participant.is_speaking = is_speaking;

        self.broadcast(
            Audience::Voice(room_id).except(user_id),
            CollabEvent::VoiceSpeakingChanged {
                room_id,
                user_id,
                is_speaking,
            },
        );

        Ok(())
    }

    /// Voice never outlives room presence, so this runs whenever a user leaves `old_room`.
    pub fn auto_leave_voice_for_room_change(&mut self, user_id: UserId, old_room: RoomId) -> bool {
        let left = self.leave_voice(user_id, old_room);

        if left {
            debug!("Removed user {} from voice after leaving room {}", user_id, old_room);
        }

        left
    }

    /// Removes the user from every voice channel they are in, returning those rooms.
    pub fn leave_all_voice(&mut self, user_id: UserId) -> Vec<RoomId> {
        let rooms = self.voice.rooms_of(user_id);

        for room_id in &rooms {
            self.leave_voice(user_id, *room_id);
        }

        rooms
    }

    pub fn voice_participants(&self, room_id: RoomId) -> Vec<VoiceParticipant> {
        self.voice.participants(room_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test_util::*, ConnectionHandle, EventReceiver};

    fn connect(state: &mut SessionState, id: UserId) -> EventReceiver {
        let (handle, rx) = ConnectionHandle::new();
        state.connect(participant(id), handle);
        rx
    }

    /// Voice membership must always imply room membership
    fn assert_coupled(state: &SessionState, users: &[UserId]) {
        for user_id in users {
            for room_id in state.voice.rooms_of(*user_id) {
                assert_eq!(
                    state.room_of(*user_id),
                    Some(room_id),
                    "user {} is in voice of room {} without being in it",
                    user_id,
                    room_id
                );
            }
        }
    }

    #[test]
    fn join_requires_room_presence() {
        let mut state = SessionState::default();
        let _a = connect(&mut state, 1);

        assert!(matches!(
            state.join_voice(1, 100),
            Err(CollabError::NotInRoom)
        ));

        state.join_room(1, 200).ok();
        assert!(matches!(
            state.join_voice(1, 100),
            Err(CollabError::NotInRoom)
        ));
    }

    #[test]
    fn join_twice_fails() {
        let mut state = SessionState::default();
        let _a = connect(&mut state, 1);

        state.join_room(1, 100).ok();
        assert!(state.join_voice(1, 100).is_ok());
        assert!(matches!(
            state.join_voice(1, 100),
            Err(CollabError::AlreadyInVoice)
        ));
    }

    #[test]
    fn joiner_receives_existing_participants() {
        let mut state = SessionState::default();
        let mut a = connect(&mut state, 1);
        let _b = connect(&mut state, 2);

        state.join_room(1, 100).ok();
        state.join_room(2, 100).ok();
        state.join_voice(1, 100).ok();
        drain(&mut a);

        let existing = state.join_voice(2, 100).unwrap_or_default();

        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].user_id, 1);
        assert!(!existing[0].is_muted && !existing[0].is_speaking);

        assert!(matches!(
            drain(&mut a).as_slice(),
            [CollabEvent::VoiceUserJoined { room_id: 100, participant }] if participant.user_id == 2
        ));
    }

    #[test]
    fn leave_is_noop_when_absent() {
        let mut state = SessionState::default();
        let _a = connect(&mut state, 1);
        let mut b = connect(&mut state, 2);

        state.join_room(1, 100).ok();
        state.join_room(2, 100).ok();
        drain(&mut b);

        assert!(!state.leave_voice(1, 100));
        assert!(drain(&mut b).is_empty());
    }

    #[test]
    fn mute_and_speaking_require_participation() {
        let mut state = SessionState::default();
        let _a = connect(&mut state, 1);
        let mut b = connect(&mut state, 2);
        let mut c = connect(&mut state, 3);

        for user in [1, 2, 3] {
            state.join_room(user, 100).ok();
        }

        assert!(matches!(
            state.set_mute(1, 100, true),
            Err(CollabError::NotInVoice)
        ));

        state.join_voice(1, 100).ok();
        state.join_voice(2, 100).ok();
        drain(&mut b);
        drain(&mut c);

        assert!(state.set_mute(1, 100, true).is_ok());
        assert!(state.voice_participants(100)[0].is_muted);
        assert_eq!(drain(&mut c).len(), 1, "room members see mute changes");

        assert!(state.set_speaking(1, 100, true).is_ok());
        assert_eq!(drain(&mut b).len(), 2);
        assert!(
            drain(&mut c).is_empty(),
            "speaking changes only go to the voice channel"
        );
    }

    #[test]
    fn room_switch_cascades_voice_leave_first() {
        let mut state = SessionState::default();
        let _a = connect(&mut state, 1);
        let mut b = connect(&mut state, 2);
        let mut c = connect(&mut state, 3);

        state.join_room(1, 100).ok();
        state.join_room(2, 100).ok();
        state.join_room(3, 200).ok();
        state.join_voice(1, 100).ok();
        drain(&mut b);
        drain(&mut c);

        state.join_room(1, 200).ok();

        assert!(state.voice_participants(100).is_empty());
        assert_coupled(&state, &[1, 2, 3]);

        assert!(matches!(
            drain(&mut b).as_slice(),
            [
                CollabEvent::VoiceUserLeft { room_id: 100, .. },
                CollabEvent::UserLeftRoom { room_id: 100, .. }
            ]
        ));
        assert!(matches!(
            drain(&mut c).as_slice(),
            [CollabEvent::UserJoinedRoom { room_id: 200, .. }]
        ));
    }

    #[test]
    fn coupling_holds_across_sequences() {
        let mut state = SessionState::default();
        let receivers: Vec<_> = (1..=4).map(|id| connect(&mut state, id)).collect();

        let rooms = [10, 20, 30];
        let users = [1, 2, 3, 4];

        for step in 0..200usize {
            let user = users[step * 7 % users.len()];
            let room = rooms[step * 5 % rooms.len()];

            match step % 5 {
                0 | 1 => {
                    state.join_room(user, room).ok();
                }
                2 => {
                    let current = state.room_of(user).unwrap_or(room);
                    state.join_voice(user, current).ok();
                }
                3 => {
                    state.leave_room(user);
                }
                _ => {
                    state.disconnect(user, None);
                    let (handle, _rx) = ConnectionHandle::new();
                    state.connect(participant(user), handle);
                }
            }

            assert_coupled(&state, &users);
        }

        drop(receivers);
    }
}
