//! The room relay: binds participant sessions to named rooms and
//! rebroadcasts their events, interpreting nothing but the envelope.
//! There is no authentication: possession of a room identifier is the
//! trust model, and all state is in-memory for the life of the process.

pub mod app_state;
pub mod config;
pub mod handlers;
pub mod push;
pub mod routes;

use std::net::SocketAddr;

pub use app_state::AppState; // Re-export for convenience
pub use config::Config;

pub async fn run(config: &Config, state: app_state::SharedState) -> anyhow::Result<()> {
    let app = routes::create_router(state);

    let addr = SocketAddr::new(config.bind, config.port);
    tracing::info!("Relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
