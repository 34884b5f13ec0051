use serde_json::Value;
use tavern_core::{PlaybackSnapshot, RoomId, Scope, Track};

use crate::{ChatMessage, DirectMessage, Identity, SignalKind, UserId, VoiceParticipant};

/// A playback state change, with the audio locator of the current track if it could be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicUpdate {
    pub snapshot: PlaybackSnapshot,
    pub audio_url: Option<String>,
}

/// Events delivered to connections
#[derive(Debug, Clone, PartialEq)]
pub enum CollabEvent {
    /// A user connected
    UserOnline { user: Identity },
    /// A user's last connection went away
    UserOffline { user: Identity },
    /// A user entered a room
    UserJoinedRoom { room_id: RoomId, user: Identity },
    /// A user left a room, by switching, leaving or disconnecting
    UserLeftRoom { room_id: RoomId, user: Identity },
    VoiceUserJoined {
        room_id: RoomId,
        participant: VoiceParticipant,
    },
    VoiceUserLeft { room_id: RoomId, user: Identity },
    VoiceStateChanged {
        room_id: RoomId,
        user_id: UserId,
        is_muted: bool,
    },
    VoiceSpeakingChanged {
        room_id: RoomId,
        user_id: UserId,
        is_speaking: bool,
    },
    /// Opaque call setup data from another user
    Signal {
        kind: SignalKind,
        from_user_id: UserId,
        payload: Value,
    },
    MusicStateChanged(MusicUpdate),
    MusicQueueUpdated { scope: Scope, queue: Vec<Track> },
    ChatMessage(ChatMessage),
    DirectMessage(DirectMessage),
    /// This connection was replaced by a newer one for the same user
    SessionSuperseded,
}
