use thiserror::Error;

use crate::Scope;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("No playback state exists for {0}")]
    NoPlaybackState(Scope),
}
