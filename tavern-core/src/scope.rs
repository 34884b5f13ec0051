use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Primary keys are issued by the external storage layer.
pub type PrimaryKey = i32;
pub type RoomId = PrimaryKey;

/// The unit playback state and broadcast audiences are partitioned by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Room(RoomId),
}

/// The scope kind as it appears in requests, without a room id attached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    #[default]
    Global,
    Room,
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Global => ScopeKind::Global,
            Scope::Room(_) => ScopeKind::Room,
        }
    }

    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Scope::Global => None,
            Scope::Room(id) => Some(*id),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Room(id) => write!(f, "room:{}", id),
        }
    }
}
