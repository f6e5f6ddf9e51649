//! Trivial liveness endpoint: `GET /` answers with a short text body.

use crate::error::{GafferError, Result};
use axum::{routing::get, Router};
use tracing::info;

async fn root() -> &'static str {
    "gaffer is running"
}

/// Bind and serve the health endpoint; runs until the process exits.
pub async fn serve(port: u16) -> Result<()> {
    let app = Router::new().route("/", get(root));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(GafferError::Health)?;
    info!("Health endpoint listening on port {port}");
    axum::serve(listener, app).await.map_err(GafferError::Health)?;
    Ok(())
}
