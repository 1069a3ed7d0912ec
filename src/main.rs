// Causal KV node entry point.

use tokio::net::TcpListener;

use causal_kv::{app_state::AppState, config::Config, http};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    let node_id = config.node_id.clone();
    let addr = config.server_address();

    let app_state = AppState::new(config)?;
    let router = http::router(app_state);

    tracing::info!(node_id, %addr, "starting causal_kv node");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
