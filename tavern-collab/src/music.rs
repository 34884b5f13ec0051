use chrono::{DateTime, Utc};
use log::{debug, info};
use tavern_core::{PlaybackEngine, PlaybackError, PlaybackSnapshot, RoomId, Scope, ScopeKind, Track, TrackId};

use crate::{Audience, Collab, CollabError, CollabEvent, CollabResult, Identity, MusicUpdate, UserId};

/// The scope a music request addresses, as sent by a client
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScopeTarget {
    pub kind: ScopeKind,
    pub room_id: Option<RoomId>,
}

/// The result of adding a track
#[derive(Debug, Clone, PartialEq)]
pub struct MusicAdded {
    pub track: Track,
    pub update: MusicUpdate,
    /// Whether adding the track started playback
    pub auto_started: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueUpdate {
    pub scope: Scope,
    pub queue: Vec<Track>,
    pub removed: Option<Track>,
}

/// The canonical transport of a scope, which clients compare their local playback against.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub scope: Scope,
    pub is_playing: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<f64>,
    pub position: f64,
    /// How far a client may drift before it should snap to `position`
    pub tolerance: f64,
}

impl ScopeTarget {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn room(room_id: RoomId) -> Self {
        Self {
            kind: ScopeKind::Room,
            room_id: Some(room_id),
        }
    }

    pub fn resolve(self) -> CollabResult<Scope> {
        match self.kind {
            ScopeKind::Global => Ok(Scope::Global),
            ScopeKind::Room => self
                .room_id
                .map(Scope::Room)
                .ok_or(CollabError::MissingRoomId),
        }
    }
}

impl From<&PlaybackSnapshot> for SyncReport {
    fn from(snapshot: &PlaybackSnapshot) -> Self {
        Self {
            scope: snapshot.scope,
            is_playing: snapshot.state.is_playing(),
            started_at: snapshot.state.started_at(),
            paused_at: snapshot.state.paused_at(),
            position: snapshot.position,
            tolerance: 0.,
        }
    }
}

impl Collab {
    pub async fn music_play(&self, user_id: UserId, target: ScopeTarget) -> CollabResult<MusicUpdate> {
        self.mutate_transport(user_id, target, |engine, scope| engine.play(scope))
            .await
    }

    pub async fn music_pause(&self, user_id: UserId, target: ScopeTarget) -> CollabResult<MusicUpdate> {
        self.mutate_transport(user_id, target, |engine, scope| engine.pause(scope))
            .await
    }

    pub async fn music_skip(&self, user_id: UserId, target: ScopeTarget) -> CollabResult<MusicUpdate> {
        self.mutate_transport(user_id, target, |engine, scope| engine.skip(scope))
            .await
    }

    pub async fn music_seek(
        &self,
        user_id: UserId,
        target: ScopeTarget,
        seconds: f64,
    ) -> CollabResult<MusicUpdate> {
        self.mutate_transport(user_id, target, |engine, scope| engine.seek(scope, seconds))
            .await
    }

    pub async fn music_volume(
        &self,
        user_id: UserId,
        target: ScopeTarget,
        volume: i64,
    ) -> CollabResult<MusicUpdate> {
        self.mutate_transport(user_id, target, |engine, scope| {
            engine.set_volume(scope, volume)
        })
        .await
    }

    /// Looks up a source and appends it to a scope's queue, starting playback if nothing was loaded.
    pub async fn music_add(
        &self,
        user_id: UserId,
        target: ScopeTarget,
        source_url: &str,
    ) -> CollabResult<MusicAdded> {
        let identity = self.authorize(user_id)?;
        let scope = target.resolve()?;

        // Nothing is touched until the source is known to exist
        let metadata = self.inputs.query(source_url).await?;
        let track = Track::new(metadata, identity.id, identity.username);

        info!("{} added \"{}\" to {}", track.added_by_name, track.metadata.title, scope);

        let (auto_started, snapshot) = {
            let session = self.session.lock();
            let (auto_started, snapshot) = self.playback.enqueue(scope, track.clone());

            if !auto_started {
                session.broadcast(
                    Audience::of_scope(scope),
                    CollabEvent::MusicQueueUpdated {
                        scope,
                        queue: snapshot.state.queue().tracks(),
                    },
                );
            }

            (auto_started, snapshot)
        };

        let update = if auto_started {
            self.publish_state(snapshot).await
        } else {
            MusicUpdate {
                audio_url: self.cached_locator(&snapshot),
                snapshot,
            }
        };

        Ok(MusicAdded {
            track,
            update,
            auto_started,
        })
    }

    /// Removes a queued track. The current track cannot be removed this way.
    pub fn music_remove(
        &self,
        user_id: UserId,
        target: ScopeTarget,
        track_id: TrackId,
    ) -> CollabResult<QueueUpdate> {
        self.authorize(user_id)?;
        let scope = target.resolve()?;

        let session = self.session.lock();
        let (removed, snapshot) = self.playback.dequeue_by_id(scope, track_id);
        let queue = snapshot.state.queue().tracks();

        if removed.is_some() {
            session.broadcast(
                Audience::of_scope(scope),
                CollabEvent::MusicQueueUpdated {
                    scope,
                    queue: queue.clone(),
                },
            );
        } else {
            debug!("Track {} is not queued in {}", track_id, scope);
        }

        Ok(QueueUpdate {
            scope,
            queue,
            removed,
        })
    }

    /// Returns the state that applies to a user, in the given room or the one they are in.
    pub async fn music_get_state(
        &self,
        user_id: UserId,
        room_id: Option<RoomId>,
    ) -> CollabResult<MusicUpdate> {
        let snapshot = {
            let session = self.session.lock();
            session
                .identity(user_id)
                .ok_or(CollabError::NotConnected(user_id))?;

            let room_id = room_id.or_else(|| session.room_of(user_id));
            let scope = self.playback.effective_scope(room_id);

            self.playback
                .snapshot(scope)
                .ok_or(PlaybackError::NoPlaybackState(scope))?
        };

        let resolved = self.resolve_locator(&snapshot).await;

        let _session = self.session.lock();
        Ok(self.fresh_update(snapshot, resolved))
    }

    pub fn music_sync(&self, user_id: UserId, target: ScopeTarget) -> CollabResult<SyncReport> {
        let scope = target.resolve()?;
        let session = self.session.lock();

        session
            .identity(user_id)
            .ok_or(CollabError::NotConnected(user_id))?;

        let snapshot = self
            .playback
            .snapshot(scope)
            .ok_or(PlaybackError::NoPlaybackState(scope))?;

        Ok(SyncReport {
            tolerance: self.config.sync_tolerance_in_seconds,
            ..SyncReport::from(&snapshot)
        })
    }

    /// Only directors may change playback. This is checked before anything else.
    fn authorize(&self, user_id: UserId) -> CollabResult<Identity> {
        let session = self.session.lock();
        let identity = session
            .identity(user_id)
            .cloned()
            .ok_or(CollabError::NotConnected(user_id))?;

        if !identity.is_director() {
            return Err(CollabError::DirectorOnly);
        }

        Ok(identity)
    }

    async fn mutate_transport(
        &self,
        user_id: UserId,
        target: ScopeTarget,
        f: impl FnOnce(&PlaybackEngine, Scope) -> PlaybackSnapshot,
    ) -> CollabResult<MusicUpdate> {
        self.authorize(user_id)?;
        let scope = target.resolve()?;

        let snapshot = {
            let _session = self.session.lock();
            f(&self.playback, scope)
        };

        Ok(self.publish_state(snapshot).await)
    }

    /// Resolves the audio of the current track and tells the scope's audience about its state.
    ///
    /// The state is read again after the lookup, so changes made while waiting are not lost.
    async fn publish_state(&self, snapshot: PlaybackSnapshot) -> MusicUpdate {
        let resolved = self.resolve_locator(&snapshot).await;

        let session = self.session.lock();
        let update = self.fresh_update(snapshot, resolved);

        session.broadcast(
            Audience::of_scope(update.snapshot.scope),
            CollabEvent::MusicStateChanged(update.clone()),
        );

        update
    }

    async fn resolve_locator(&self, snapshot: &PlaybackSnapshot) -> Option<(TrackId, String)> {
        let track = snapshot.state.current_track()?;
        let locator = self
            .locators
            .resolve(self.inputs.as_ref(), &track.metadata.source_url)
            .await?;

        Some((track.id, locator))
    }

    /// Builds an update from the scope's current state. Must be called with the session locked.
    fn fresh_update(
        &self,
        fallback: PlaybackSnapshot,
        resolved: Option<(TrackId, String)>,
    ) -> MusicUpdate {
        let snapshot = self
            .playback
            .snapshot(fallback.scope)
            .unwrap_or(fallback);

        let current = snapshot.state.current_track().map(|t| t.id);
        let audio_url = match resolved {
            Some((track_id, locator)) if Some(track_id) == current => Some(locator),
            _ => self.cached_locator(&snapshot),
        };

        MusicUpdate {
            snapshot,
            audio_url,
        }
    }

    fn cached_locator(&self, snapshot: &PlaybackSnapshot) -> Option<String> {
        snapshot
            .state
            .current_track()
            .and_then(|t| self.locators.cached(&t.metadata.source_url))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use tavern_core::Transport;

    use super::*;
    use crate::test_util::*;

    #[tokio::test]
    async fn adding_to_an_empty_scope_starts_playback() {
        let (collab, _) = collab_with_clock();
        let _gm = collab.connect(director(1));
        let mut player = collab.connect(participant(2));
        drain(&mut player.events);

        let added = collab
            .music_add(1, ScopeTarget::global(), "https://example.com/tavern.mp3")
            .await
            .expect("track is added");

        assert!(added.auto_started);
        assert!(added.update.snapshot.state.is_playing());
        assert_eq!(
            added.update.audio_url.as_deref(),
            Some("https://cdn.example.com/tavern.mp3")
        );

        match drain(&mut player.events).as_slice() {
            [CollabEvent::MusicStateChanged(update)] => {
                assert!(update.snapshot.state.is_playing());
                assert_eq!(
                    update.snapshot.state.current_track().map(|t| t.id),
                    Some(added.track.id)
                );
            }
            events => panic!("unexpected events {:?}", events),
        }
    }

    #[tokio::test]
    async fn adding_behind_a_track_updates_the_queue() {
        let (collab, _) = collab_with_clock();
        let _gm = collab.connect(director(1));
        let mut player = collab.connect(participant(2));

        collab
            .music_add(1, ScopeTarget::global(), "https://example.com/a.mp3")
            .await
            .ok();
        drain(&mut player.events);

        let added = collab
            .music_add(1, ScopeTarget::global(), "https://example.com/b.mp3")
            .await
            .expect("track is added");

        assert!(!added.auto_started);
        assert!(matches!(
            drain(&mut player.events).as_slice(),
            [CollabEvent::MusicQueueUpdated { scope: Scope::Global, queue }] if queue.len() == 1
        ));
    }

    #[tokio::test]
    async fn sync_reports_the_derived_position() {
        let (collab, clock) = collab_with_clock();
        let _gm = collab.connect(director(1));

        collab
            .music_add(1, ScopeTarget::global(), "https://example.com/a.mp3")
            .await
            .ok();
        collab.music_pause(1, ScopeTarget::global()).await.ok();
        collab.music_seek(1, ScopeTarget::global(), 0.).await.ok();
        collab.music_play(1, ScopeTarget::global()).await.ok();

        clock.advance_seconds(10.);

        let report = collab.music_sync(1, ScopeTarget::global()).expect("global state exists");
        assert!(report.is_playing);
        assert!((report.position - 10.).abs() <= 0.1);
        assert_eq!(report.tolerance, 3.0);
    }

    #[tokio::test]
    async fn participants_cannot_control_music() {
        let (collab, _) = collab_with_clock();
        let _gm = collab.connect(director(1));
        let _player = collab.connect(participant(2));

        collab
            .music_add(1, ScopeTarget::global(), "https://example.com/a.mp3")
            .await
            .ok();
        collab.music_pause(1, ScopeTarget::global()).await.ok();

        let before = collab.music_get_state(2, None).await.ok();

        assert!(matches!(
            collab.music_play(2, ScopeTarget::global()).await,
            Err(CollabError::DirectorOnly)
        ));
        assert!(matches!(
            collab.music_skip(2, ScopeTarget::global()).await,
            Err(CollabError::DirectorOnly)
        ));
        assert!(matches!(
            collab.music_volume(2, ScopeTarget::global(), 0).await,
            Err(CollabError::DirectorOnly)
        ));
        assert!(matches!(
            collab
                .music_add(2, ScopeTarget::global(), "https://example.com/b.mp3")
                .await,
            Err(CollabError::DirectorOnly)
        ));
        assert!(matches!(
            collab.music_remove(2, ScopeTarget::global(), TrackId::none()),
            Err(CollabError::DirectorOnly)
        ));

        let after = collab.music_get_state(2, None).await.ok();
        assert_eq!(
            before.map(|u| u.snapshot.state),
            after.map(|u| u.snapshot.state)
        );
    }

    #[tokio::test]
    async fn authorization_is_checked_before_scope() {
        let (collab, _) = collab_with_clock();
        let _player = collab.connect(participant(2));

        let target = ScopeTarget {
            kind: ScopeKind::Room,
            room_id: None,
        };

        assert!(matches!(
            collab.music_play(2, target).await,
            Err(CollabError::DirectorOnly)
        ));

        let _gm = collab.connect(director(1));
        assert!(matches!(
            collab.music_play(1, target).await,
            Err(CollabError::MissingRoomId)
        ));
    }

    #[tokio::test]
    async fn failed_lookups_keep_the_mutation() {
        let collab = collab_with_inputs(FakeInputs::failing_locate());
        let _gm = collab.connect(director(1));

        let added = collab
            .music_add(1, ScopeTarget::global(), "https://example.com/a.mp3")
            .await
            .expect("metadata lookup still works");

        assert!(added.update.snapshot.state.is_playing());
        assert_eq!(added.update.audio_url, None);
    }

    #[tokio::test]
    async fn slow_lookups_do_not_attach_audio_to_a_skipped_track() {
        let gate = Arc::new(LocateGate::default());
        let collab = collab_with_inputs(FakeInputs::gated(gate.clone()));
        let _gm = collab.connect(director(1));
        let mut player = collab.connect(participant(2));
        drain(&mut player.events);

        let add_first = collab.music_add(1, ScopeTarget::global(), "https://example.com/a.mp3");
        let skip_meanwhile = async {
            gate.entered.notified().await;

            collab
                .music_add(1, ScopeTarget::global(), "https://example.com/b.mp3")
                .await
                .expect("second track is queued");
            let skipped = collab
                .music_skip(1, ScopeTarget::global())
                .await
                .expect("director may skip");

            gate.release.notify_one();
            skipped
        };

        let (added, skipped) = tokio::join!(add_first, skip_meanwhile);
        let added = added.expect("first track is added");

        assert!(added.auto_started);
        assert_eq!(skipped.audio_url.as_deref(), Some("https://cdn.example.com/b.mp3"));

        let current = |update: &MusicUpdate| update.snapshot.state.current_track().map(|t| t.metadata.title.clone());

        assert_eq!(current(&added.update).as_deref(), Some("b.mp3"));
        assert_eq!(added.update.audio_url.as_deref(), Some("https://cdn.example.com/b.mp3"));

        match drain(&mut player.events).last() {
            Some(CollabEvent::MusicStateChanged(update)) => {
                assert_eq!(current(update).as_deref(), Some("b.mp3"));
                assert_eq!(update.audio_url.as_deref(), Some("https://cdn.example.com/b.mp3"));
            }
            event => panic!("unexpected event {:?}", event),
        }
    }

    #[tokio::test]
    async fn huge_seeks_are_clamped_while_playing() {
        let (collab, _) = collab_with_clock();
        let _gm = collab.connect(director(1));

        collab
            .music_add(1, ScopeTarget::global(), "https://example.com/a.mp3")
            .await
            .ok();

        let update = collab
            .music_seek(1, ScopeTarget::global(), 1e15)
            .await
            .expect("director may seek");

        assert!(update.snapshot.state.is_playing());
        assert!((update.snapshot.position - 120.).abs() <= 0.1);
    }

    #[tokio::test]
    async fn huge_seeks_while_paused_can_still_be_played() {
        let (collab, _) = collab_with_clock();
        let _gm = collab.connect(director(1));

        collab
            .music_add(1, ScopeTarget::global(), "https://example.com/a.mp3")
            .await
            .ok();
        collab.music_pause(1, ScopeTarget::global()).await.ok();
        collab.music_seek(1, ScopeTarget::global(), 1e15).await.ok();

        let update = collab
            .music_play(1, ScopeTarget::global())
            .await
            .expect("director may play");

        assert!(update.snapshot.state.is_playing());
        assert!((update.snapshot.position - 120.).abs() <= 0.1);
    }

    #[tokio::test]
    async fn missing_sources_change_nothing() {
        let collab = collab_with_inputs(FakeInputs::failing_query());
        let _gm = collab.connect(director(1));

        assert!(matches!(
            collab
                .music_add(1, ScopeTarget::global(), "https://example.com/a.mp3")
                .await,
            Err(CollabError::Input(_))
        ));

        let state = collab.playback_snapshot(Scope::Global).map(|s| s.state);
        assert!(state.is_some_and(|s| !s.is_active()));
    }

    #[tokio::test]
    async fn room_playback_reaches_only_the_room() {
        let (collab, _) = collab_with_clock();
        let _gm = collab.connect(director(1));
        let mut inside = collab.connect(participant(2));
        let mut outside = collab.connect(participant(3));

        collab.join_room(1, 100).ok();
        collab.join_room(2, 100).ok();
        drain(&mut inside.events);
        drain(&mut outside.events);

        collab
            .music_add(1, ScopeTarget::room(100), "https://example.com/battle.mp3")
            .await
            .ok();

        assert_eq!(drain(&mut inside.events).len(), 1);
        assert!(drain(&mut outside.events).is_empty());

        let state = collab.music_get_state(2, None).await.ok();
        assert_eq!(state.map(|u| u.snapshot.scope), Some(Scope::Room(100)));

        let state = collab.music_get_state(3, None).await.ok();
        assert_eq!(state.map(|u| u.snapshot.scope), Some(Scope::Global));
    }

    #[tokio::test]
    async fn removing_only_touches_the_queue() {
        let (collab, _) = collab_with_clock();
        let _gm = collab.connect(director(1));

        let first = collab
            .music_add(1, ScopeTarget::global(), "https://example.com/a.mp3")
            .await
            .expect("track is added");
        let second = collab
            .music_add(1, ScopeTarget::global(), "https://example.com/b.mp3")
            .await
            .expect("track is added");

        let update = collab
            .music_remove(1, ScopeTarget::global(), first.track.id)
            .expect("director may remove");
        assert_eq!(update.removed, None, "the current track is not in the queue");

        let update = collab
            .music_remove(1, ScopeTarget::global(), second.track.id)
            .expect("director may remove");
        assert_eq!(update.removed.map(|t| t.id), Some(second.track.id));
        assert!(update.queue.is_empty());

        let state = collab.playback_snapshot(Scope::Global).map(|s| s.state);
        assert_eq!(
            state.and_then(|s| s.current_track().map(|t| t.id)),
            Some(first.track.id)
        );
    }

    #[tokio::test]
    async fn syncing_a_room_without_state_fails() {
        let (collab, _) = collab_with_clock();
        let _player = collab.connect(participant(2));

        assert!(matches!(
            collab.music_sync(2, ScopeTarget::room(7)),
            Err(CollabError::Playback(PlaybackError::NoPlaybackState(Scope::Room(7))))
        ));
    }

    #[tokio::test]
    async fn volume_is_clamped() {
        let (collab, _) = collab_with_clock();
        let _gm = collab.connect(director(1));

        let update = collab
            .music_volume(1, ScopeTarget::global(), 250)
            .await
            .expect("director may set volume");
        assert_eq!(update.snapshot.state.volume(), 100);

        let update = collab
            .music_volume(1, ScopeTarget::global(), -5)
            .await
            .expect("director may set volume");
        assert_eq!(update.snapshot.state.volume(), 0);
        assert_eq!(
            update.snapshot.state.transport(),
            Transport::Paused { paused_at: None }
        );
    }
}
