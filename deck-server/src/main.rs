use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let ax = deck_server::build().await?;

    let host = ax
        .app
        .get(deck_server::config::HTTP_HOST)
        .unwrap_or_else(|| "127.0.0.1".to_string());

    let port = ax
        .app
        .get(deck_server::config::HTTP_PORT)
        .unwrap_or_else(|| "3000".to_string());

    let addr = format!("{host}:{port}");

    tracing::info!("[deck-server] listening on http://{addr}");

    ax.listen(addr).await?;

    Ok(())
}
