use crate::{Id, PrimaryKey};

pub type TrackId = Id<Track>;

/// Describes a playable piece of media, as returned by a media lookup
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    /// The URL the track was added with
    pub source_url: String,
    pub title: String,
    /// The length of the track, in seconds.
    pub duration: f64,
    pub thumbnail: Option<String>,
}

/// A single track in a queue
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub metadata: TrackMetadata,
    /// The user that added the track
    pub added_by: PrimaryKey,
    pub added_by_name: String,
}

impl Track {
    pub fn new(metadata: TrackMetadata, added_by: PrimaryKey, added_by_name: String) -> Self {
        Self {
            id: TrackId::new(),
            metadata,
            added_by,
            added_by_name,
        }
    }
}
