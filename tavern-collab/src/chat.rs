use chrono::{DateTime, Utc};
use log::debug;
use tavern_core::RoomId;

use crate::{Audience, Collab, CollabError, CollabEvent, CollabResult, Identity, UserId};

/// A chat line, sent to the sender's room or to everyone when they are in the global space.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub room_id: Option<RoomId>,
    pub from: Identity,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectMessage {
    pub from: Identity,
    pub to: UserId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl Collab {
    /// Relays a chat message to everyone who shares the sender's space.
    /// Returns the message as delivered, for the sender's own echo.
    pub fn send_chat(&self, user_id: UserId, content: String) -> CollabResult<ChatMessage> {
        let session = self.session.lock();

        let from = session
            .identity(user_id)
            .cloned()
            .ok_or(CollabError::NotConnected(user_id))?;

        let room_id = session.room_of(user_id);
        let message = ChatMessage {
            room_id,
            from,
            content,
            sent_at: self.playback.now(),
        };

        let audience = room_id.map(Audience::Room).unwrap_or(Audience::Everyone);
        let delivered = session.broadcast(
            audience.except(user_id),
            CollabEvent::ChatMessage(message.clone()),
        );

        debug!("Chat message from {} reached {} users", user_id, delivered);
        Ok(message)
    }

    pub fn send_direct_message(
        &self,
        user_id: UserId,
        to: UserId,
        content: String,
    ) -> CollabResult<DirectMessage> {
        let session = self.session.lock();

        let from = session
            .identity(user_id)
            .cloned()
            .ok_or(CollabError::NotConnected(user_id))?;

        let message = DirectMessage {
            from,
            to,
            content,
            sent_at: self.playback.now(),
        };

        let delivered = session.broadcast(
            Audience::User(to),
            CollabEvent::DirectMessage(message.clone()),
        );

        if delivered == 0 {
            return Err(CollabError::TargetNotConnected);
        }

        Ok(message)
    }
}
