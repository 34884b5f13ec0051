use log::debug;
use serde_json::Value;

use crate::{CollabError, CollabEvent, CollabResult, SessionState, UserId};

/// The kinds of call setup messages exchanged between two voice participants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    CallOffer,
    CallAnswer,
    NetworkCandidate,
}

impl SessionState {
    /// Forwards an opaque signaling payload to another user's connection.
    ///
    /// Nothing is stored and the payload is never inspected.
    pub fn relay(
        &self,
        from_user_id: UserId,
        to_user_id: UserId,
        kind: SignalKind,
        payload: Value,
    ) -> CollabResult<()> {
        let target = self
            .registry
            .lookup(to_user_id)
            .ok_or(CollabError::TargetNotConnected)?;

        let sent = target.send(CollabEvent::Signal {
            kind,
            from_user_id,
            payload,
        });

        if !sent {
            return Err(CollabError::TargetNotConnected);
        }

        debug!("Relayed {:?} from {} to {}", kind, from_user_id, to_user_id);
        Ok(())
    }
}
