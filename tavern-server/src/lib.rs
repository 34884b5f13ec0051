mod auth;
mod context;
mod errors;
mod gateway;
mod protocol;
mod serialized;

use axum::Router;
use log::info;
use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::*;
pub use errors::*;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// Starts the tavern server, and runs until it fails
pub async fn run_server(context: ServerContext) -> ServerResult<()> {
    let port = match env::var("TAVERN_SERVER_PORT") {
        Ok(port) => port.parse::<u16>().map_err(|_| ServerError::InvalidPort(port))?,
        Err(_) => DEFAULT_PORT,
    };

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = gateway::router();

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, root_router).await?;
    Ok(())
}
