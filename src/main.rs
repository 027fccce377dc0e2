// src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use garantias_backend::{
    build_router,
    config::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    // Reenvio periódico das adesões que o financeiro ainda não recebeu
    let engine = app_state.engine.clone();
    let intervalo = config.retry_financeiro;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(intervalo);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.adesoes.retry_pending_notifications().await {
                tracing::error!("🔥 Falha no reenvio ao financeiro: {}", e);
            }
            engine.deps.locks.prune();
        }
    });

    let app = build_router(app_state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
