//! Remote HTTP inventory.
//!
//! Fetches a JSON array of `{ "hostname": ..., "address": ... }` objects.

use std::time::Duration;

use reqwest::Client;

use super::{Binding, FetchError, InventorySource};

/// User-Agent header value for HTTP requests.
const USER_AGENT: &str = concat!("hostcast/", env!("CARGO_PKG_VERSION"));

/// Inventory served by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct RemoteInventory {
    client: Client,
    url: String,
}

impl RemoteInventory {
    /// Create a remote inventory for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the HTTP client cannot be created.
    pub fn new(url: String, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self { client, url })
    }
}

impl InventorySource for RemoteInventory {
    async fn fetch(&self) -> Result<Vec<Binding>, FetchError> {
        let url = &self.url;
        let network = |err: reqwest::Error| {
            if err.is_timeout() {
                FetchError::Timeout { url: url.clone() }
            } else {
                FetchError::Network {
                    url: url.clone(),
                    source: err,
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.clone(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(network)?;
        serde_json::from_str(&body).map_err(|source| FetchError::Json {
            url: url.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single HTTP response on an ephemeral port and return its URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        format!("http://{addr}/bindings")
    }

    fn inventory(url: String) -> RemoteInventory {
        RemoteInventory::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn should_decode_json_bindings() {
        let url = serve_once(
            "200 OK",
            r#"[{"hostname":"node1.local.","address":"10.0.0.5"},{"hostname":"db.service.local.","address":"10.0.1.2"}]"#,
        )
        .await;

        let bindings = inventory(url).fetch().await.unwrap();

        assert_eq!(
            bindings,
            vec![
                Binding::new("node1.local.", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))),
                Binding::new("db.service.local.", IpAddr::V4(Ipv4Addr::new(10, 0, 1, 2))),
            ]
        );
    }

    #[tokio::test]
    async fn should_report_http_status_errors() {
        let url = serve_once("503 Service Unavailable", "").await;

        let result = inventory(url).fetch().await;
        assert!(matches!(result, Err(FetchError::HttpStatus { status: 503, .. })));
    }

    #[tokio::test]
    async fn should_report_invalid_documents() {
        let url = serve_once("200 OK", r#"{"not":"an array"}"#).await;

        let result = inventory(url).fetch().await;
        assert!(matches!(result, Err(FetchError::Json { .. })));
    }

    #[tokio::test]
    async fn should_report_connection_failures() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = inventory(format!("http://{addr}/bindings")).fetch().await;
        assert!(matches!(
            result,
            Err(FetchError::Network { .. } | FetchError::Timeout { .. })
        ));
    }
}
