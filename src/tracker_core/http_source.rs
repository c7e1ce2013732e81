//! HTTP snapshot source
//!
//! Polls a JSON endpoint that exposes the visible window. Accepted bodies:
//!
//! ```json
//! ["coin-ct", "coin-t", "coin-bonus"]
//! {"window": ["CT", "T", "BONUS"]}
//! ```

use crate::tracker_core::source::{SnapshotSource, SourceError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WindowBody {
    Tokens(Vec<String>),
    Wrapped { window: Vec<String> },
}

impl WindowBody {
    fn into_tokens(self) -> Vec<String> {
        match self {
            WindowBody::Tokens(tokens) => tokens,
            WindowBody::Wrapped { window } => window,
        }
    }
}

pub struct HttpSnapshotSource {
    url: String,
    request_timeout: Duration,
}

pub struct HttpHandle {
    client: reqwest::Client,
}

impl HttpSnapshotSource {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout,
        }
    }

    async fn fetch(&self, client: &reqwest::Client) -> Result<Vec<String>, SourceError> {
        let response = client.get(&self.url).send().await.map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }

        let body = response.text().await.map_err(map_reqwest_error)?;
        parse_window_body(&body)
    }
}

pub fn parse_window_body(body: &str) -> Result<Vec<String>, SourceError> {
    serde_json::from_str::<WindowBody>(body)
        .map(WindowBody::into_tokens)
        .map_err(|e| SourceError::Malformed(e.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::ReadTimeout
    } else {
        SourceError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    type Handle = HttpHandle;

    async fn acquire(&mut self) -> Result<HttpHandle, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        // Fetch once so an unreachable endpoint fails acquisition, not the first tick
        let initial = self.fetch(&client).await?;
        log::info!("🔗 Connected to {} ({} items visible)", self.url, initial.len());

        Ok(HttpHandle { client })
    }

    async fn snapshot(&mut self, handle: &mut HttpHandle) -> Result<Vec<String>, SourceError> {
        self.fetch(&handle.client).await
    }

    async fn release(&mut self, handle: HttpHandle) {
        drop(handle);
        log::debug!("Released HTTP source {}", self.url);
    }

    fn source_type(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `body` with `status` to every connection until the test ends
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}/rolls", addr)
    }

    #[test]
    fn test_parse_window_body() {
        assert_eq!(
            parse_window_body(r#"["CT","T"]"#).unwrap(),
            vec!["CT".to_string(), "T".to_string()]
        );
        assert_eq!(
            parse_window_body(r#"{"window":["coin-bonus"]}"#).unwrap(),
            vec!["coin-bonus".to_string()]
        );
        assert!(matches!(
            parse_window_body(r#"{"rolls":1}"#),
            Err(SourceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_http_snapshot() {
        let url = serve("200 OK", r#"{"window":["CT","T","BONUS"]}"#).await;
        let mut source = HttpSnapshotSource::new(url, Duration::from_secs(5));

        let mut handle = source.acquire().await.unwrap();
        let window = source.snapshot(&mut handle).await.unwrap();
        assert_eq!(window, vec!["CT", "T", "BONUS"]);
        source.release(handle).await;
    }

    #[tokio::test]
    async fn test_http_error_status_is_unavailable() {
        let url = serve("503 Service Unavailable", "[]").await;
        let mut source = HttpSnapshotSource::new(url, Duration::from_secs(5));

        assert!(matches!(source.acquire().await, Err(SourceError::Unavailable(_))));
    }
}
