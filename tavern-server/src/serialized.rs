//! Everything the gateway sends to clients is defined here
//! along with the ToSerialized impls

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tavern_collab::{
    ChatMessage, CollabEvent, DirectMessage, Identity, JoinedRoom, MusicAdded, MusicUpdate,
    QueueUpdate, SignalKind, SyncReport, VoiceParticipant,
};
use tavern_core::{RoomId, ScopeKind, Track};

/// A frame sent over the gateway
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Ack(Ack),
    Event(ServerEvent),
}

/// The answer to a request that carried an id
#[derive(Debug, Serialize)]
pub struct Ack {
    id: u64,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    UserOnline { user: User },
    UserOffline { user: User },
    UserJoinedRoom(RoomPresence),
    UserLeftRoom(RoomPresence),
    VoiceUserJoined { room_id: RoomId, user: VoiceUser },
    VoiceUserLeft { room_id: RoomId, user: User },
    VoiceOffer(Signal),
    VoiceAnswer(Signal),
    VoiceIceCandidate(Signal),
    VoiceStateChanged {
        room_id: RoomId,
        user_id: i32,
        is_muted: bool,
    },
    VoiceSpeakingChanged {
        room_id: RoomId,
        user_id: i32,
        is_speaking: bool,
    },
    MusicStateChanged(MusicState),
    MusicQueueUpdated {
        scope: ScopeKind,
        room_id: Option<RoomId>,
        queue: Vec<QueueTrack>,
    },
    ChatMessage(Chat),
    DirectMessage(Direct),
    SessionSuperseded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: i32,
    username: String,
    role: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPresence {
    room_id: RoomId,
    user_id: i32,
    username: String,
    role: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceUser {
    user_id: i32,
    username: String,
    role: &'static str,
    is_muted: bool,
    is_speaking: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    from_user_id: i32,
    payload: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueTrack {
    id: u64,
    source_url: String,
    title: String,
    /// In seconds
    duration: f64,
    thumbnail: Option<String>,
    added_by: i32,
    added_by_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicState {
    scope: ScopeKind,
    room_id: Option<RoomId>,
    current_track: Option<QueueTrack>,
    queue: Vec<QueueTrack>,
    is_playing: bool,
    /// Unix milliseconds of the instant the track would have been at zero
    started_at: Option<i64>,
    /// Seconds
    paused_at: Option<f64>,
    position: f64,
    volume: u8,
    audio_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    scope: ScopeKind,
    room_id: Option<RoomId>,
    is_playing: bool,
    started_at: Option<i64>,
    paused_at: Option<f64>,
    current_position: f64,
    tolerance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    room_id: Option<RoomId>,
    from: User,
    content: String,
    sent_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Direct {
    from: User,
    to_user_id: i32,
    content: String,
    sent_at: i64,
}

#[derive(Debug, Serialize)]
pub struct Success {
    success: bool,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    success: bool,
    users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct VoiceUserList {
    success: bool,
    users: Vec<VoiceUser>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackAdded {
    track: QueueTrack,
    state: MusicState,
    auto_started: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    scope: ScopeKind,
    room_id: Option<RoomId>,
    queue: Vec<QueueTrack>,
    removed: Option<QueueTrack>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl Ack {
    pub fn ok(id: u64, data: Value) -> Self {
        Self {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: u64, error: String) -> Self {
        Self {
            id,
            ok: false,
            data: None,
            error: Some(error),
        }
    }
}

impl Success {
    pub fn new() -> Self {
        Self { success: true }
    }
}

impl Default for Success {
    fn default() -> Self {
        Self::new()
    }
}

impl UserList {
    pub fn new(users: &[Identity]) -> Self {
        Self {
            success: true,
            users: users.iter().map(|u| u.to_serialized()).collect(),
        }
    }
}

impl VoiceUserList {
    pub fn new(users: &[VoiceParticipant]) -> Self {
        Self {
            success: true,
            users: users.iter().map(|u| u.to_serialized()).collect(),
        }
    }
}

fn millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

impl ToSerialized<User> for Identity {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            role: self.role.as_str(),
        }
    }
}

impl ToSerialized<VoiceUser> for VoiceParticipant {
    fn to_serialized(&self) -> VoiceUser {
        VoiceUser {
            user_id: self.user_id,
            username: self.username.clone(),
            role: self.role.as_str(),
            is_muted: self.is_muted,
            is_speaking: self.is_speaking,
        }
    }
}

impl ToSerialized<QueueTrack> for Track {
    fn to_serialized(&self) -> QueueTrack {
        QueueTrack {
            id: self.id.value(),
            source_url: self.metadata.source_url.clone(),
            title: self.metadata.title.clone(),
            duration: self.metadata.duration,
            thumbnail: self.metadata.thumbnail.clone(),
            added_by: self.added_by,
            added_by_name: self.added_by_name.clone(),
        }
    }
}

impl ToSerialized<MusicState> for MusicUpdate {
    fn to_serialized(&self) -> MusicState {
        let snapshot = &self.snapshot;
        let state = &snapshot.state;

        MusicState {
            scope: snapshot.scope.kind(),
            room_id: snapshot.scope.room_id(),
            current_track: state.current_track().cloned().to_serialized(),
            queue: state.queue().tracks().to_serialized(),
            is_playing: state.is_playing(),
            started_at: state.started_at().map(millis),
            paused_at: state.paused_at(),
            position: snapshot.position,
            volume: state.volume(),
            audio_url: self.audio_url.clone(),
        }
    }
}

impl ToSerialized<SyncState> for SyncReport {
    fn to_serialized(&self) -> SyncState {
        SyncState {
            scope: self.scope.kind(),
            room_id: self.scope.room_id(),
            is_playing: self.is_playing,
            started_at: self.started_at.map(millis),
            paused_at: self.paused_at,
            current_position: self.position,
            tolerance: self.tolerance,
        }
    }
}

impl ToSerialized<Chat> for ChatMessage {
    fn to_serialized(&self) -> Chat {
        Chat {
            room_id: self.room_id,
            from: self.from.to_serialized(),
            content: self.content.clone(),
            sent_at: millis(self.sent_at),
        }
    }
}

impl ToSerialized<Direct> for DirectMessage {
    fn to_serialized(&self) -> Direct {
        Direct {
            from: self.from.to_serialized(),
            to_user_id: self.to,
            content: self.content.clone(),
            sent_at: millis(self.sent_at),
        }
    }
}

impl ToSerialized<UserList> for JoinedRoom {
    fn to_serialized(&self) -> UserList {
        UserList::new(&self.users)
    }
}

impl ToSerialized<TrackAdded> for MusicAdded {
    fn to_serialized(&self) -> TrackAdded {
        TrackAdded {
            track: self.track.to_serialized(),
            state: self.update.to_serialized(),
            auto_started: self.auto_started,
        }
    }
}

impl ToSerialized<QueueState> for QueueUpdate {
    fn to_serialized(&self) -> QueueState {
        QueueState {
            scope: self.scope.kind(),
            room_id: self.scope.room_id(),
            queue: self.queue.to_serialized(),
            removed: self.removed.to_serialized(),
        }
    }
}

impl ToSerialized<ServerEvent> for CollabEvent {
    fn to_serialized(&self) -> ServerEvent {
        match self.clone() {
            CollabEvent::UserOnline { user } => ServerEvent::UserOnline {
                user: user.to_serialized(),
            },
            CollabEvent::UserOffline { user } => ServerEvent::UserOffline {
                user: user.to_serialized(),
            },
            CollabEvent::UserJoinedRoom { room_id, user } => {
                ServerEvent::UserJoinedRoom(RoomPresence::new(room_id, &user))
            }
            CollabEvent::UserLeftRoom { room_id, user } => {
                ServerEvent::UserLeftRoom(RoomPresence::new(room_id, &user))
            }
            CollabEvent::VoiceUserJoined {
                room_id,
                participant,
            } => ServerEvent::VoiceUserJoined {
                room_id,
                user: participant.to_serialized(),
            },
            CollabEvent::VoiceUserLeft { room_id, user } => ServerEvent::VoiceUserLeft {
                room_id,
                user: user.to_serialized(),
            },
            CollabEvent::Signal {
                kind,
                from_user_id,
                payload,
            } => {
                let signal = Signal {
                    from_user_id,
                    payload,
                };

                match kind {
                    SignalKind::CallOffer => ServerEvent::VoiceOffer(signal),
                    SignalKind::CallAnswer => ServerEvent::VoiceAnswer(signal),
                    SignalKind::NetworkCandidate => ServerEvent::VoiceIceCandidate(signal),
                }
            }
            CollabEvent::VoiceStateChanged {
                room_id,
                user_id,
                is_muted,
            } => ServerEvent::VoiceStateChanged {
                room_id,
                user_id,
                is_muted,
            },
            CollabEvent::VoiceSpeakingChanged {
                room_id,
                user_id,
                is_speaking,
            } => ServerEvent::VoiceSpeakingChanged {
                room_id,
                user_id,
                is_speaking,
            },
            CollabEvent::MusicStateChanged(update) => {
                ServerEvent::MusicStateChanged(update.to_serialized())
            }
            CollabEvent::MusicQueueUpdated { scope, queue } => ServerEvent::MusicQueueUpdated {
                scope: scope.kind(),
                room_id: scope.room_id(),
                queue: queue.to_serialized(),
            },
            CollabEvent::ChatMessage(message) => ServerEvent::ChatMessage(message.to_serialized()),
            CollabEvent::DirectMessage(message) => {
                ServerEvent::DirectMessage(message.to_serialized())
            }
            CollabEvent::SessionSuperseded => ServerEvent::SessionSuperseded,
        }
    }
}

impl RoomPresence {
    fn new(room_id: RoomId, user: &Identity) -> Self {
        Self {
            room_id,
            user_id: user.id,
            username: user.username.clone(),
            role: user.role.as_str(),
        }
    }
}
