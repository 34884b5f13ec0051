use std::collections::VecDeque;

use crate::{Track, TrackId};

/// A linear first-in first-out queue of tracks.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlaybackQueue {
    items: VecDeque<Track>,
}

impl PlaybackQueue {
    pub fn push(&mut self, track: Track) {
        self.items.push_back(track);
    }

    /// Removes and returns the head of the queue
    pub fn next(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Removes the track with the given id, returning it if it was queued
    pub fn remove(&mut self, id: TrackId) -> Option<Track> {
        let index = self.items.iter().position(|t| t.id == id)?;
        self.items.remove(index)
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
