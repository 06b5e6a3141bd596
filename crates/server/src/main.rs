use monster_core::{config, Config};
use monster_server::{build_router, startup};
use tracing::info;

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    config::load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let state = startup::build_app_state(&config)?;
    let app = build_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight workers finish their current cookie before exit.
    state.manager.stop();
    Ok(())
}
