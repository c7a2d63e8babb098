use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use rust_link_titler::{
    config::Config,
    api::routes::create_router,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::load()?;
    let server_addr = config.server_addr;
    info!(
        %server_addr,
        max_http_connections = config.max_http_connections,
        "starting server"
    );

    let app_state = AppState::new(config)?;
    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;
    info!("listening on {}", server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
