use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use tavern_core::{Config, ManualClock, TrackMetadata};
use tokio::sync::Notify;

use crate::{Collab, CollabEvent, EventReceiver, Identity, InputError, MediaInputs, Role, UserId};

pub fn participant(id: UserId) -> Identity {
    Identity {
        id,
        username: format!("player{}", id),
        role: Role::Participant,
    }
}

pub fn director(id: UserId) -> Identity {
    Identity {
        id,
        username: format!("gm{}", id),
        role: Role::Director,
    }
}

/// Takes every event currently waiting on a receiver
pub fn drain(receiver: &mut EventReceiver) -> Vec<CollabEvent> {
    let mut events = vec![];

    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }

    events
}

pub fn collab() -> Collab {
    collab_with_clock().0
}

pub fn collab_with_clock() -> (Collab, Arc<ManualClock>) {
    let clock = ManualClock::starting_now();
    let collab = Collab::new(
        Config::default(),
        clock.clone(),
        Arc::new(FakeInputs::default()),
    );

    (collab, clock)
}

pub fn collab_with_inputs(inputs: FakeInputs) -> Collab {
    Collab::new(
        Config::default(),
        ManualClock::starting_now(),
        Arc::new(inputs),
    )
}

/// Holds the first audio lookup until released
#[derive(Debug, Default)]
pub struct LocateGate {
    pub entered: Notify,
    pub release: Notify,
}

/// Media lookups that never leave the process
#[derive(Debug, Default)]
pub struct FakeInputs {
    fail_query: bool,
    fail_locate: bool,
    gate: Option<Arc<LocateGate>>,
    locate_calls: AtomicUsize,
}

impl FakeInputs {
    pub fn failing_query() -> Self {
        Self {
            fail_query: true,
            ..Default::default()
        }
    }

    pub fn failing_locate() -> Self {
        Self {
            fail_locate: true,
            ..Default::default()
        }
    }

    pub fn gated(gate: Arc<LocateGate>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn locate_calls(&self) -> usize {
        self.locate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaInputs for FakeInputs {
    async fn query(&self, url: &str) -> Result<TrackMetadata, InputError> {
        if self.fail_query {
            return Err(InputError::NotFound);
        }

        Ok(TrackMetadata {
            source_url: url.to_string(),
            title: url.rsplit('/').next().unwrap_or(url).to_string(),
            duration: 120.,
            thumbnail: None,
        })
    }

    async fn locate(&self, source_url: &str) -> Result<String, InputError> {
        let previous_calls = self.locate_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = self.gate.as_ref().filter(|_| previous_calls == 0) {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.fail_locate {
            return Err(InputError::Unavailable);
        }

        Ok(source_url.replace("https://example.com/", "https://cdn.example.com/"))
    }
}
