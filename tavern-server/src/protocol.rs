//! Everything a client can send over the gateway.
//!
//! A request looks like `{"id": 1, "event": "join_room", "data": {"roomId": 100}}`.
//! The id is optional, requests without one get no acknowledgement.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tavern_collab::{ScopeTarget, SignalKind};
use tavern_core::{RoomId, ScopeKind, TrackId};
use validator::Validate;

use crate::{ServerError, ServerResult};

/// A request as it arrives, before its payload is looked at
#[derive(Debug, Deserialize)]
pub struct RawRequest {
    pub id: Option<u64>,
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JoinRoom(RoomSchema),
    LeaveRoom,
    RoomUsers(RoomSchema),
    OnlineUsers,
    VoiceJoin(RoomSchema),
    VoiceLeave(RoomSchema),
    VoiceSignal(SignalKind, SignalSchema),
    VoiceStateUpdate(VoiceStateSchema),
    VoiceSpeaking(VoiceSpeakingSchema),
    MusicPlay(ScopeSchema),
    MusicPause(ScopeSchema),
    MusicSkip(ScopeSchema),
    MusicAdd(MusicAddSchema),
    MusicRemove(MusicRemoveSchema),
    MusicSeek(MusicSeekSchema),
    MusicVolume(MusicVolumeSchema),
    MusicGetState(MusicGetStateSchema),
    MusicSync(ScopeSchema),
    ChatMessage(ChatSchema),
    DirectMessage(DirectMessageSchema),
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSchema {
    #[validate(range(min = 1))]
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSchema {
    pub target_user_id: i32,
    /// Passed on untouched
    #[serde(default, alias = "offer", alias = "answer", alias = "candidate")]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStateSchema {
    pub room_id: RoomId,
    pub is_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSpeakingSchema {
    pub room_id: RoomId,
    pub is_speaking: bool,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSchema {
    #[serde(default)]
    pub scope: ScopeKind,
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicAddSchema {
    #[validate(url, length(max = 2048))]
    #[serde(alias = "url")]
    pub source_url: String,
    #[serde(flatten)]
    pub scope: ScopeSchema,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicRemoveSchema {
    pub track_id: u64,
    #[serde(flatten)]
    pub scope: ScopeSchema,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicSeekSchema {
    /// Negative positions are clamped to the start, anything past a day is refused
    #[validate(range(max = 86400.0))]
    #[serde(alias = "position", alias = "value")]
    pub seconds: f64,
    #[serde(flatten)]
    pub scope: ScopeSchema,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicVolumeSchema {
    #[serde(alias = "value")]
    pub volume: i64,
    #[serde(flatten)]
    pub scope: ScopeSchema,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicGetStateSchema {
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSchema {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageSchema {
    pub to_user_id: i32,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

impl RawRequest {
    pub fn parse(text: &str) -> ServerResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ClientEvent {
    /// Decodes and validates the payload of a named event.
    pub fn parse(event: &str, data: Value) -> ServerResult<Self> {
        let event = match event {
            "join_room" => Self::JoinRoom(schema(data)?),
            "leave_room" => Self::LeaveRoom,
            "room_users" => Self::RoomUsers(schema(data)?),
            "online_users" => Self::OnlineUsers,
            "voice_join" => Self::VoiceJoin(schema(data)?),
            "voice_leave" => Self::VoiceLeave(schema(data)?),
            "voice_offer" => Self::VoiceSignal(SignalKind::CallOffer, schema(data)?),
            "voice_answer" => Self::VoiceSignal(SignalKind::CallAnswer, schema(data)?),
            "voice_ice_candidate" => {
                Self::VoiceSignal(SignalKind::NetworkCandidate, schema(data)?)
            }
            "voice_state_update" => Self::VoiceStateUpdate(schema(data)?),
            "voice_speaking" => Self::VoiceSpeaking(schema(data)?),
            "music_play" => Self::MusicPlay(schema(data)?),
            "music_pause" => Self::MusicPause(schema(data)?),
            "music_skip" => Self::MusicSkip(schema(data)?),
            "music_add" => Self::MusicAdd(schema(data)?),
            "music_remove" => Self::MusicRemove(schema(data)?),
            "music_seek" => Self::MusicSeek(schema(data)?),
            "music_volume" => Self::MusicVolume(schema(data)?),
            "music_get_state" => Self::MusicGetState(schema(data)?),
            "music_sync" => Self::MusicSync(schema(data)?),
            "chat_message" => Self::ChatMessage(schema(data)?),
            "direct_message" => Self::DirectMessage(schema(data)?),
            other => return Err(ServerError::UnknownEvent(other.to_string())),
        };

        Ok(event)
    }
}

impl ScopeSchema {
    pub fn target(&self) -> ScopeTarget {
        ScopeTarget {
            kind: self.scope,
            room_id: self.room_id,
        }
    }
}

impl MusicRemoveSchema {
    pub fn track_id(&self) -> TrackId {
        TrackId::from_value(self.track_id)
    }
}

fn schema<T>(data: Value) -> ServerResult<T>
where
    T: DeserializeOwned + Validate,
{
    // Events with only optional fields may be sent without data
    let data = match data {
        Value::Null => Value::Object(Default::default()),
        data => data,
    };

    let schema: T =
        serde_json::from_value(data).map_err(|e| ServerError::InvalidPayload(e.to_string()))?;

    schema
        .validate()
        .map_err(|e| ServerError::InvalidPayload(e.to_string()))?;

    Ok(schema)
}
