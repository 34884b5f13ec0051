use tavern_core::PlaybackError;
use thiserror::Error;

use crate::{InputError, UserId};

pub type CollabResult<T> = Result<T, CollabError>;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("User {0} is not connected")]
    NotConnected(UserId),
    #[error("Must be in the room to join its voice channel")]
    NotInRoom,
    #[error("Already in voice")]
    AlreadyInVoice,
    #[error("Not in voice")]
    NotInVoice,
    #[error("Target not connected")]
    TargetNotConnected,
    #[error("Only the director can control music")]
    DirectorOnly,
    #[error("A room id is required for the room scope")]
    MissingRoomId,
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Input(#[from] InputError),
}
