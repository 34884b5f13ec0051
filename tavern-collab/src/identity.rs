use serde::Deserialize;
use tavern_core::PrimaryKey;

pub type UserId = PrimaryKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Director,
    Participant,
}

/// Who a connection belongs to, as attached by authentication
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Director => "director",
            Role::Participant => "participant",
        }
    }
}

impl Identity {
    pub fn is_director(&self) -> bool {
        self.role == Role::Director
    }
}
