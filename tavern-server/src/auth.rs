use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Query},
    http::{header, request::Parts},
};
use serde::Deserialize;
use tavern_collab::Identity;

use crate::{ServerContext, ServerError};

/// The authenticated identity of a request. Extracting it fails the request with 401 otherwise.
pub struct Session(Identity);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl Session {
    pub fn into_identity(self) -> Identity {
        self.0
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok());

        // Browsers cannot set headers on a WebSocket handshake, so the query is accepted too
        let token = match header {
            Some(header) => bearer_token(header)?,
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|q| q.0.token)
                .ok_or(ServerError::MissingAuthorization)?,
        };

        let identity = context.auth.authenticate(&token).await?;
        Ok(Self(identity))
    }
}

fn bearer_token(header: &str) -> Result<String, ServerError> {
    let parts: Vec<_> = header.split_ascii_whitespace().collect();

    if parts.first() != Some(&"Bearer") || parts.len() != 2 {
        return Err(ServerError::MalformedAuthorization);
    }

    Ok(parts[1].to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc").ok(), Some("abc".to_string()));
        assert!(matches!(
            bearer_token("Basic abc"),
            Err(ServerError::MalformedAuthorization)
        ));
        assert!(matches!(
            bearer_token("Bearer"),
            Err(ServerError::MalformedAuthorization)
        ));
    }
}
