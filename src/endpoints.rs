//! Endpoint server for exposing metrics and health checks

use crate::metrics::metrics;
use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start the endpoint server
///
/// Serves `GET /metrics` (Prometheus text) and `GET /health`.
pub async fn endpoint_server(port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Metrics endpoint listening on {}", addr);
    serve(listener).await
}

/// Accept loop on an already bound listener
pub async fn serve(listener: TcpListener) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((mut socket, peer)) => {
                tokio::spawn(async move {
                    let mut buf = [0; 1024];
                    match socket.read(&mut buf).await {
                        Ok(n) => {
                            let response = respond(&buf[..n]);
                            if let Err(e) = socket.write_all(response.as_bytes()).await {
                                tracing::debug!(%peer, "Failed to write response: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::error!("Failed to read from socket: {}", e);
                        }
                    }
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}

fn request_path(request: &[u8]) -> Option<&str> {
    let line = std::str::from_utf8(request).ok()?.lines().next()?;
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(path)) => Some(path),
        _ => None,
    }
}

fn respond(request: &[u8]) -> String {
    match request_path(request) {
        Some("/metrics") => match metrics().gather_text() {
            Ok(body) => http_response("200 OK", "text/plain; version=0.0.4", &body),
            Err(e) => http_response("500 Internal Server Error", "text/plain", &e.to_string()),
        },
        Some("/health") => http_response("200 OK", "application/json", r#"{"status":"ok"}"#),
        Some(_) => http_response("404 Not Found", "text/plain", "not found"),
        None => http_response("400 Bad Request", "text/plain", "bad request"),
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing() {
        assert!(respond(b"GET /health HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 200 OK"));
        assert!(respond(b"GET /nope HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 404"));
        assert!(respond(b"garbage").starts_with("HTTP/1.1 400"));

        metrics().lifecycle_sweeps.inc();
        let body = respond(b"GET /metrics HTTP/1.1\r\n\r\n");
        assert!(body.contains("lifecycle_sweeps_total"));
    }

    #[tokio::test]
    async fn test_serves_health_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /health HTTP/1.1\r\n\r\n").await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        assert!(out.contains(r#"{"status":"ok"}"#));
    }
}
