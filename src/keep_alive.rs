//! Always-on HTTP responder polled by the hosting platform and the IVR.

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tracing::info;

async fn home() -> &'static str {
    "הבוט חי!"
}

/// Answers the IVR's wake-up call with a read-aloud instruction.
async fn wakeup() -> &'static str {
    "id_list_message=t-השרת פעיל והקוד עובד"
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/wakeup", get(wakeup))
}

pub async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Keep-alive endpoint listening");
    axum::serve(listener, app()).await?;
    Ok(())
}
