use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use log::info;
use thiserror::Error;

use crate::Identity;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token was provided")]
    Missing,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Failed to load tokens: {0}")]
    Load(String),
}

/// Resolves the token a connection presents into the identity it acts as.
///
/// Nothing about a connection is registered until this succeeds.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Authenticates against a fixed table of tokens, issued elsewhere.
///
/// The table is a JSON object mapping each token to an identity:
/// `{"secret": {"id": 1, "username": "gm", "role": "director"}}`
#[derive(Debug, Default)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl StaticAuthenticator {
    pub fn new(tokens: HashMap<String, Identity>) -> Result<Self, AuthError> {
        if let Some((_, identity)) = tokens.iter().find(|(_, i)| i.username.trim().is_empty()) {
            return Err(AuthError::Load(format!(
                "User {} has an empty username",
                identity.id
            )));
        }

        Ok(Self { tokens })
    }

    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let tokens = serde_json::from_str(json).map_err(|e| AuthError::Load(e.to_string()))?;
        Self::new(tokens)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Load(format!("{}: {}", path.display(), e)))?;

        let authenticator = Self::from_json(&json)?;
        info!(
            "Loaded {} tokens from {}",
            authenticator.tokens.len(),
            path.display()
        );

        Ok(authenticator)
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Missing);
        }

        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
