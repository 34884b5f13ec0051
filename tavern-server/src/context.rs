use std::sync::Arc;

use axum::extract::FromRef;
use tavern_collab::{Authenticator, Collab};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
    pub auth: Arc<dyn Authenticator>,
}
