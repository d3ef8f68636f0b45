use roomlog::{api, RoomService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let addr: SocketAddr = std::env::var("ROOMLOG_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:13000".to_string())
        .parse()?;
    let data_dir = std::env::var("ROOMLOG_DATA").unwrap_or_else(|_| "./data".to_string());

    info!("Starting chat server (data in {})...", data_dir);
    let service = Arc::new(RoomService::open(data_dir).await?);
    let app = api::router(service.clone());

    let listener = TcpListener::bind(addr).await?;
    info!("Server running on http://{}", addr);
    info!("API endpoints:");
    info!("  GET  /api/health                      - Liveness check");
    info!("  POST /api/rp                          - Create a room");
    info!("  GET  /api/rp/:slug                    - Full room state");
    info!("  GET  /api/rp/:slug/updates?since=N    - Documents after a watermark");
    info!("  POST /api/rp/:slug/:collection        - Append a document (msgs or charas)");

    // Ordered shutdown: stop accepting on ctrl-c, drain in-flight
    // requests, then close the store.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    service.close().await?;
    info!("Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
}
