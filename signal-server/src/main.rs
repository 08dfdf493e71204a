use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let app = copier_signal_server::bootstrap::setup().await?;

    tracing::info!(bind_address = %app.bind_address, "signal-server starting");
    let listener = tokio::net::TcpListener::bind(app.socket_addr).await?;
    axum::serve(listener, app.router).await?;

    Ok(())
}
