use log::debug;
use tavern_core::{RoomId, Scope};

use crate::{CollabEvent, SessionState, UserId};

/// Who an event is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every connected user
    Everyone,
    /// Everyone present in a room
    Room(RoomId),
    /// Everyone in a room's voice channel
    Voice(RoomId),
    /// A single user
    User(UserId),
}

/// An [Audience], optionally leaving out one user (usually the one who caused the event)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipients {
    pub audience: Audience,
    pub except: Option<UserId>,
}

impl Audience {
    pub fn except(self, user_id: UserId) -> Recipients {
        Recipients {
            audience: self,
            except: Some(user_id),
        }
    }

    /// The audience of playback changes in a scope
    pub fn of_scope(scope: Scope) -> Self {
        match scope {
            Scope::Global => Self::Everyone,
            Scope::Room(room_id) => Self::Room(room_id),
        }
    }
}

impl From<Audience> for Recipients {
    fn from(audience: Audience) -> Self {
        Self {
            audience,
            except: None,
        }
    }
}

impl SessionState {
    /// Delivers an event to every live connection in the audience, returning how many received it.
    pub fn broadcast(&self, recipients: impl Into<Recipients>, event: CollabEvent) -> usize {
        let recipients = recipients.into();
        let mut delivered = 0;

        for user_id in self.audience_members(recipients.audience) {
            if recipients.except == Some(user_id) {
                continue;
            }

            let Some(handle) = self.registry.lookup(user_id) else {
                continue;
            };

            if handle.send(event.clone()) {
                delivered += 1;
            } else {
                debug!("Dropped event for user {}, connection is closing", user_id);
            }
        }

        delivered
    }

    fn audience_members(&self, audience: Audience) -> Vec<UserId> {
        match audience {
            Audience::Everyone => self.registry.user_ids(),
            Audience::Room(room_id) => self.presence.members(room_id),
            Audience::Voice(room_id) => self
                .voice
                .participants(room_id)
                .into_iter()
                .map(|p| p.user_id)
                .collect(),
            Audience::User(user_id) => vec![user_id],
        }
    }
}
