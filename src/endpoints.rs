//! Endpoint server for exposing metrics and health checks

use anyhow::Result;
use prometheus::TextEncoder;
use tokio::net::TcpListener;

use crate::metrics::metrics;

/// Start the metrics endpoint server
pub async fn metrics_server(port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Metrics endpoint listening on {}", addr);

    loop {
        match listener.accept().await {
            Ok((mut socket, _peer)) => {
                tokio::spawn(async move {
                    use tokio::io::{AsyncReadExt, AsyncWriteExt};

                    let mut buf = [0; 1024];
                    if socket.read(&mut buf).await.is_err() {
                        return;
                    }

                    let body = TextEncoder::new()
                        .encode_to_string(&metrics().registry().gather())
                        .unwrap_or_else(|e| {
                            tracing::error!("Failed to encode metrics: {}", e);
                            String::new()
                        });
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}
