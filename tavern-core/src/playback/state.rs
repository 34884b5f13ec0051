use chrono::{DateTime, Utc};

use crate::{duration_to_seconds, seconds_to_duration, Config, PlaybackQueue, Track, TrackId};

/// Whether a playback state is moving, and the anchor its position is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transport {
    /// Playing since the instant position zero would have started.
    Playing { started_at: DateTime<Utc> },
    /// Stopped at the given position, in seconds. [None] means the start.
    Paused { paused_at: Option<f64> },
}

impl Default for Transport {
    fn default() -> Self {
        Self::Paused { paused_at: None }
    }
}

/// The background audio state of a single scope.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    current_track: Option<Track>,
    queue: PlaybackQueue,
    transport: Transport,
    volume: u8,
}

impl PlaybackState {
    pub fn new(config: &Config) -> Self {
        Self {
            current_track: None,
            queue: Default::default(),
            transport: Default::default(),
            volume: config.default_volume.min(Config::MAX_VOLUME),
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.transport, Transport::Playing { .. })
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self.transport {
            Transport::Playing { started_at } => Some(started_at),
            Transport::Paused { .. } => None,
        }
    }

    pub fn paused_at(&self) -> Option<f64> {
        match self.transport {
            Transport::Playing { .. } => None,
            Transport::Paused { paused_at } => paused_at,
        }
    }

    /// Returns true if this state has something to play, which makes it take precedence when resolving scopes.
    pub fn is_active(&self) -> bool {
        self.current_track.is_some() || !self.queue.is_empty()
    }

    /// The current position in seconds, derived from the anchor.
    pub fn position(&self, now: DateTime<Utc>) -> f64 {
        match self.transport {
            Transport::Playing { started_at } => duration_to_seconds(now - started_at).max(0.),
            Transport::Paused { paused_at } => paused_at.unwrap_or(0.),
        }
    }

    /// Starts or resumes playback, promoting the head of the queue if nothing is loaded.
    pub fn play(&mut self, now: DateTime<Utc>) {
        if self.current_track.is_none() {
            self.current_track = self.queue.next();
        }

        if self.current_track.is_none() {
            return;
        }

        // Playing again while already playing keeps the anchor instead of re-deriving it
        if let Transport::Paused { paused_at } = self.transport {
            self.transport = Transport::Playing {
                started_at: anchor_at(now, paused_at.unwrap_or(0.)),
            };
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.is_playing() {
            self.transport = Transport::Paused {
                paused_at: Some(self.position(now)),
            };
        }
    }

    /// Moves on to the next queued track, or stops if the queue is drained.
    pub fn skip(&mut self, now: DateTime<Utc>) {
        match self.queue.next() {
            Some(track) => {
                self.current_track = Some(track);
                self.transport = Transport::Playing { started_at: now };
            }
            None => {
                self.current_track = None;
                self.transport = Transport::Paused { paused_at: None };
            }
        }
    }

    /// Moves to a position, clamped to the length of the current track when it is known.
    pub fn seek(&mut self, now: DateTime<Utc>, seconds: f64) {
        let Some(track) = &self.current_track else {
            return;
        };

        let limit = if track.metadata.duration > 0. {
            track.metadata.duration.min(Config::MAX_SEEK_IN_SECONDS)
        } else {
            Config::MAX_SEEK_IN_SECONDS
        };

        let seconds = if seconds.is_finite() {
            seconds.clamp(0., limit)
        } else {
            0.
        };

        self.transport = match self.transport {
            Transport::Playing { .. } => Transport::Playing {
                started_at: anchor_at(now, seconds),
            },
            Transport::Paused { .. } => Transport::Paused {
                paused_at: Some(seconds),
            },
        };
    }

    /// Appends a track to the queue. Returns true if this started playback.
    pub fn enqueue(&mut self, now: DateTime<Utc>, track: Track) -> bool {
        let was_empty = self.current_track.is_none();

        self.queue.push(track);

        if was_empty {
            self.play(now);
        }

        was_empty
    }

    /// Removes a queued track. The current track is never affected.
    pub fn dequeue_by_id(&mut self, id: TrackId) -> Option<Track> {
        self.queue.remove(id)
    }

    /// Sets the volume, clamped to 0..=100, and returns the applied value.
    pub fn set_volume(&mut self, volume: i64) -> u8 {
        self.volume = volume.clamp(0, Config::MAX_VOLUME as i64) as u8;
        self.volume
    }
}

/// The instant playback must have started at to be `seconds` in at `now`.
fn anchor_at(now: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    now.checked_sub_signed(seconds_to_duration(seconds))
        .unwrap_or(now)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ManualClock, TrackMetadata, Clock};

    fn track(title: &str) -> Track {
        Track::new(
            TrackMetadata {
                source_url: format!("https://example.com/{}.mp3", title),
                title: title.to_string(),
                duration: 180.,
                thumbnail: None,
            },
            1,
            "director".to_string(),
        )
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.1,
            "expected {} to be close to {}",
            actual,
            expected
        );
    }

    #[test]
    fn play_then_position_starts_at_zero() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        state.enqueue(clock.now(), track("a"));

        assert!(state.is_playing());
        assert_close(state.position(clock.now()), 0.);

        clock.advance_seconds(10.);
        assert_close(state.position(clock.now()), 10.);
    }

    #[test]
    fn pause_and_resume_keeps_position() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        state.enqueue(clock.now(), track("a"));
        clock.advance_seconds(42.);
        state.pause(clock.now());

        assert!(!state.is_playing());
        assert_eq!(state.started_at(), None);
        assert_close(state.paused_at().unwrap_or_default(), 42.);

        clock.advance_seconds(300.);
        assert_close(state.position(clock.now()), 42.);

        state.play(clock.now());
        assert!(state.is_playing());
        assert_eq!(state.paused_at(), None);
        assert_close(state.position(clock.now()), 42.);
    }

    #[test]
    fn play_while_playing_keeps_anchor() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        state.enqueue(clock.now(), track("a"));
        clock.advance_seconds(5.);
        state.play(clock.now());

        assert_close(state.position(clock.now()), 5.);
    }

    #[test]
    fn play_without_tracks_is_noop() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        state.play(clock.now());

        assert!(!state.is_playing());
        assert!(state.current_track().is_none());
    }

    #[test]
    fn skip_promotes_head_or_drains() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        state.enqueue(clock.now(), track("a"));
        let b = track("b");
        state.enqueue(clock.now(), b.clone());
        state.pause(clock.now());

        clock.advance_seconds(3.);
        state.skip(clock.now());

        assert_eq!(state.current_track(), Some(&b));
        assert!(state.is_playing());
        assert_close(state.position(clock.now()), 0.);

        state.skip(clock.now());

        assert!(state.current_track().is_none());
        assert!(!state.is_playing());
        assert_eq!(state.started_at(), None);
        assert_eq!(state.paused_at(), None);
    }

    #[test]
    fn seek_moves_anchor_or_paused_position() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        state.seek(clock.now(), 30.);
        assert_eq!(state.paused_at(), None, "seek without a track is a no-op");

        state.enqueue(clock.now(), track("a"));
        state.seek(clock.now(), 30.);
        assert_close(state.position(clock.now()), 30.);

        state.pause(clock.now());
        state.seek(clock.now(), 12.);
        assert_eq!(state.paused_at(), Some(12.));

        state.seek(clock.now(), -4.);
        assert_eq!(state.paused_at(), Some(0.));
    }

    #[test]
    fn huge_seeks_clamp_to_the_track_length() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        state.enqueue(clock.now(), track("a"));
        state.seek(clock.now(), 1e15);
        assert_close(state.position(clock.now()), 180.);

        state.pause(clock.now());
        state.seek(clock.now(), 1e15);
        assert_eq!(state.paused_at(), Some(180.));

        state.play(clock.now());
        assert!(state.is_playing());
        assert_close(state.position(clock.now()), 180.);
    }

    #[test]
    fn huge_seeks_without_a_known_length_stay_bounded() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        let mut live = track("live");
        live.metadata.duration = 0.;
        state.enqueue(clock.now(), live);
        state.pause(clock.now());
        state.seek(clock.now(), 1e15);

        assert_eq!(state.paused_at(), Some(Config::MAX_SEEK_IN_SECONDS));

        state.play(clock.now());
        assert_close(state.position(clock.now()), Config::MAX_SEEK_IN_SECONDS);
    }

    #[test]
    fn enqueue_only_autostarts_when_nothing_is_loaded() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        assert!(state.enqueue(clock.now(), track("a")));
        assert!(!state.enqueue(clock.now(), track("b")));
        assert_eq!(state.queue().len(), 1);
    }

    #[test]
    fn dequeue_leaves_current_track_alone() {
        let clock = ManualClock::starting_now();
        let mut state = PlaybackState::new(&Config::default());

        let a = track("a");
        let b = track("b");
        state.enqueue(clock.now(), a.clone());
        state.enqueue(clock.now(), b.clone());

        assert_eq!(state.dequeue_by_id(a.id), None);
        assert_eq!(state.dequeue_by_id(b.id), Some(b));
        assert_eq!(state.current_track(), Some(&a));
        assert!(state.queue().is_empty());
    }

    #[test]
    fn volume_is_clamped() {
        let mut state = PlaybackState::new(&Config::default());

        assert_eq!(state.set_volume(150), 100);
        assert_eq!(state.set_volume(-3), 0);
        assert_eq!(state.set_volume(55), 55);
    }
}
