use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};

use crate::{Config, PlaybackError, PlaybackState, RoomId, Scope, SharedClock, Track, TrackId};

/// A copy of a scope's playback state, along with the position derived at the time it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub scope: Scope,
    pub state: PlaybackState,
    /// The position in seconds at `taken_at`.
    pub position: f64,
    pub taken_at: DateTime<Utc>,
}

/// The playback clock engine keeps one [PlaybackState] per scope.
///
/// The global state exists for the life of the engine, room states are created on first mutation.
#[derive(Debug)]
pub struct PlaybackEngine {
    config: Config,
    clock: SharedClock,
    states: DashMap<Scope, PlaybackState>,
}

impl PlaybackEngine {
    pub fn new(config: Config, clock: SharedClock) -> Self {
        let states = DashMap::new();
        states.insert(Scope::Global, PlaybackState::new(&config));

        Self {
            config,
            clock,
            states,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns a snapshot of the given scope, if it has a state.
    pub fn snapshot(&self, scope: Scope) -> Option<PlaybackSnapshot> {
        let now = self.now();

        self.states
            .get(&scope)
            .map(|state| Self::snapshot_of(scope, &state, now))
    }

    /// Returns the scope whose state applies to a user in the given room.
    ///
    /// A room's own state wins as long as it has a current track or queued tracks.
    pub fn effective_scope(&self, room_id: Option<RoomId>) -> Scope {
        room_id
            .map(Scope::Room)
            .filter(|scope| {
                self.states
                    .get(scope)
                    .map(|state| state.is_active())
                    .unwrap_or(false)
            })
            .unwrap_or(Scope::Global)
    }

    /// Returns the derived position of a scope, in seconds.
    pub fn position(&self, scope: Scope) -> Result<f64, PlaybackError> {
        self.snapshot(scope)
            .map(|s| s.position)
            .ok_or(PlaybackError::NoPlaybackState(scope))
    }

    pub fn play(&self, scope: Scope) -> PlaybackSnapshot {
        self.mutate(scope, |state, now| state.play(now)).1
    }

    pub fn pause(&self, scope: Scope) -> PlaybackSnapshot {
        self.mutate(scope, |state, now| state.pause(now)).1
    }

    pub fn skip(&self, scope: Scope) -> PlaybackSnapshot {
        self.mutate(scope, |state, now| state.skip(now)).1
    }

    pub fn seek(&self, scope: Scope, seconds: f64) -> PlaybackSnapshot {
        self.mutate(scope, |state, now| state.seek(now, seconds)).1
    }

    /// Appends a track and returns whether it caused playback to auto-start.
    pub fn enqueue(&self, scope: Scope, track: Track) -> (bool, PlaybackSnapshot) {
        self.mutate(scope, |state, now| state.enqueue(now, track))
    }

    pub fn dequeue_by_id(&self, scope: Scope, id: TrackId) -> (Option<Track>, PlaybackSnapshot) {
        self.mutate(scope, |state, _| state.dequeue_by_id(id))
    }

    pub fn set_volume(&self, scope: Scope, volume: i64) -> PlaybackSnapshot {
        self.mutate(scope, |state, _| state.set_volume(volume)).1
    }

    /// Drops a room's state if it has nothing to play. Returns true if it was removed.
    pub fn evict_if_idle(&self, room_id: RoomId) -> bool {
        let evicted = self
            .states
            .remove_if(&Scope::Room(room_id), |_, state| !state.is_active())
            .is_some();

        if evicted {
            debug!("Evicted idle playback state of room {}", room_id);
        }

        evicted
    }

    /// Applies a mutation to a scope's state, creating it if needed.
    fn mutate<R>(
        &self,
        scope: Scope,
        f: impl FnOnce(&mut PlaybackState, DateTime<Utc>) -> R,
    ) -> (R, PlaybackSnapshot) {
        let now = self.now();

        let mut state = self.states.entry(scope).or_insert_with(|| {
            info!("Creating playback state for {}", scope);
            PlaybackState::new(&self.config)
        });

        let result = f(&mut state, now);
        let snapshot = Self::snapshot_of(scope, &state, now);

        (result, snapshot)
    }

    fn snapshot_of(scope: Scope, state: &PlaybackState, now: DateTime<Utc>) -> PlaybackSnapshot {
        PlaybackSnapshot {
            scope,
            state: state.clone(),
            position: state.position(now),
            taken_at: now,
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{ManualClock, TrackMetadata};

    fn engine() -> (PlaybackEngine, Arc<ManualClock>) {
        let clock = ManualClock::starting_now();
        let engine = PlaybackEngine::new(Config::default(), clock.clone());

        (engine, clock)
    }

    fn track(title: &str) -> Track {
        Track::new(
            TrackMetadata {
                source_url: format!("https://example.com/{}.ogg", title),
                title: title.to_string(),
                duration: 200.,
                thumbnail: Some("https://example.com/art.png".to_string()),
            },
            7,
            "gm".to_string(),
        )
    }

    #[test]
    fn global_state_always_exists() {
        let (engine, _) = engine();

        assert!(engine.snapshot(Scope::Global).is_some());
        assert_eq!(
            engine.position(Scope::Room(3)),
            Err(PlaybackError::NoPlaybackState(Scope::Room(3)))
        );
    }

    #[test]
    fn play_then_sync_ten_seconds_later() {
        let (engine, clock) = engine();

        engine.enqueue(Scope::Global, track("a"));
        engine.play(Scope::Global);
        clock.advance_seconds(10.);

        let position = engine.position(Scope::Global).unwrap_or_default();
        assert!((position - 10.).abs() <= 0.1);
    }

    #[test]
    fn room_state_takes_precedence_while_active() {
        let (engine, _) = engine();

        engine.enqueue(Scope::Global, track("ambience"));
        assert_eq!(engine.effective_scope(Some(100)), Scope::Global);

        engine.set_volume(Scope::Room(100), 20);
        assert_eq!(
            engine.effective_scope(Some(100)),
            Scope::Global,
            "an idle room state does not take over"
        );

        engine.enqueue(Scope::Room(100), track("battle"));
        assert_eq!(engine.effective_scope(Some(100)), Scope::Room(100));
        assert_eq!(engine.effective_scope(None), Scope::Global);

        engine.skip(Scope::Room(100));
        assert_eq!(engine.effective_scope(Some(100)), Scope::Global);
    }

    #[test]
    fn only_idle_rooms_are_evicted() {
        let (engine, _) = engine();

        engine.enqueue(Scope::Room(1), track("a"));
        assert!(!engine.evict_if_idle(1));

        engine.skip(Scope::Room(1));
        assert!(engine.evict_if_idle(1));
        assert!(engine.snapshot(Scope::Room(1)).is_none());
    }
}
