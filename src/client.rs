//! Transport primitives used by the probe scheduler and their HTTP implementation


use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, StatusCode, Url};
use std::time::{Duration, Instant};

/// Chunks of one streamed download, in arrival order
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

/// Raw transfer operations a probe session is built from
///
/// Every call is one independent request. Implementations apply their own
/// per-request timeout and report it as an error; the scheduler decides whether
/// an error is a lost probe or a degraded stream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// One round trip against the latency endpoint
    async fn probe(&self) -> Result<Duration>;

    /// Open one streamed download of roughly `byte_count` bytes
    async fn open_download(&self, byte_count: u64) -> Result<ChunkStream>;

    /// Send one upload chunk and wait for the server to accept it
    async fn send_upload_chunk(&self, payload: Bytes) -> Result<()>;
}

/// Where download streams fetch their data from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEndpoint {
    /// The server sizes the body from a `bytes` query parameter
    Sized(String),
    /// The server always returns the same file; reads stop at the requested size
    Fixed(String),
}

impl DownloadEndpoint {
    pub fn url(&self) -> &str {
        match self {
            Self::Sized(url) | Self::Fixed(url) => url,
        }
    }

    /// URL for a download of `byte_count` bytes
    pub fn request_url(&self, byte_count: u64) -> Result<Url> {
        match self {
            Self::Sized(base) => {
                let mut url = Url::parse(base)?;
                url.query_pairs_mut()
                    .append_pair("bytes", &byte_count.to_string());
                Ok(url)
            }
            Self::Fixed(url) => Ok(Url::parse(url)?),
        }
    }
}

/// Endpoints one HTTP transport talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpEndpoints {
    pub download: DownloadEndpoint,
    pub upload_url: String,
    pub ping_url: String,
}

impl HttpEndpoints {
    /// Endpoints of a server that sizes downloads via `?bytes=` and answers
    /// `?bytes=0` for latency probes
    pub fn sized(download_url: &str, upload_url: &str) -> Result<Self> {
        let ping_url = DownloadEndpoint::Sized(download_url.to_string())
            .request_url(0)?
            .to_string();
        Ok(Self {
            download: DownloadEndpoint::Sized(download_url.to_string()),
            upload_url: upload_url.to_string(),
            ping_url,
        })
    }
}

/// reqwest-backed transport
///
/// Probes and upload chunks are bounded by the request timeout as a whole. A
/// download is bounded by it until the headers arrive and between chunks, so
/// a slow but steady link keeps its stream alive up to the download cap.
pub struct HttpTransport {
    client: Client,
    endpoints: HttpEndpoints,
    timeout: Duration,
    download_cap: Duration,
}

impl HttpTransport {
    /// Create a new transport with a per-request timeout
    pub fn new(endpoints: HttpEndpoints, timeout: Duration) -> Result<Self> {
        HttpUtils::validate_url(endpoints.download.url())?;
        HttpUtils::validate_url(&endpoints.upload_url)?;
        HttpUtils::validate_url(&endpoints.ping_url)?;

        let client = Client::builder()
            .user_agent(format!("{}/{}", crate::PKG_NAME, crate::VERSION))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoints,
            timeout,
            download_cap: crate::defaults::DOWNLOAD_STREAM_CAP,
        })
    }

    /// Longest time one download stream may run; reaching it ends the stream
    /// without an error
    pub fn with_download_cap(mut self, cap: Duration) -> Self {
        self.download_cap = cap;
        self
    }

    pub fn endpoints(&self) -> &HttpEndpoints {
        &self.endpoints
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time a HEAD request against an arbitrary URL
    ///
    /// Used to rank servers; any HTTP status counts as reachable.
    pub async fn head_latency(&self, url: &str, timeout: Duration) -> Result<Duration> {
        let start = Instant::now();
        self.client
            .head(url)
            .timeout(timeout)
            .send()
            .await?;
        Ok(start.elapsed())
    }
}

fn ensure_success(status: StatusCode, what: &str) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(AppError::http_request(format!("{} returned status {}", what, status)))
    }
}

/// Bound a chunk stream in time
///
/// A chunk that takes longer than `idle` to arrive ends the stream with a
/// timeout error. Reaching `cap` ends it cleanly.
fn pace_stream(stream: ChunkStream, idle: Duration, cap: Duration) -> ChunkStream {
    let deadline = tokio::time::Instant::now() + cap;
    futures::stream::unfold(Some(stream), move |state| async move {
        let mut stream = state?;
        match tokio::time::timeout_at(deadline, tokio::time::timeout(idle, stream.next())).await {
            Err(_) => None,
            Ok(Err(_)) => Some((
                Err(AppError::timeout(format!("no data for {}ms", idle.as_millis()))),
                None,
            )),
            Ok(Ok(Some(item))) => Some((item, Some(stream))),
            Ok(Ok(None)) => None,
        }
    })
    .boxed()
}

/// Stop a chunk stream once `limit` bytes were yielded, cutting the last chunk
fn limit_stream(stream: ChunkStream, limit: u64) -> ChunkStream {
    stream
        .scan(limit, |remaining, item| {
            if *remaining == 0 {
                return futures::future::ready(None);
            }
            let item = item.map(|mut chunk| {
                if chunk.len() as u64 > *remaining {
                    chunk.truncate(*remaining as usize);
                }
                *remaining -= chunk.len() as u64;
                chunk
            });
            futures::future::ready(Some(item))
        })
        .boxed()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe(&self) -> Result<Duration> {
        let start = Instant::now();
        let response = self
            .client
            .get(&self.endpoints.ping_url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::probe(e.to_string()))?;
        ensure_success(response.status(), "Latency endpoint")
            .map_err(|e| AppError::probe(e.to_string()))?;
        response
            .bytes()
            .await
            .map_err(|e| AppError::probe(e.to_string()))?;
        Ok(start.elapsed())
    }

    async fn open_download(&self, byte_count: u64) -> Result<ChunkStream> {
        let url = self.endpoints.download.request_url(byte_count)?;
        let request = self
            .client
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                AppError::timeout(format!("Download endpoint did not answer within {}ms", self.timeout.as_millis()))
            })??;
        ensure_success(response.status(), "Download endpoint")?;

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(AppError::from))
            .boxed();
        let paced = pace_stream(chunks, self.timeout, self.download_cap);
        Ok(limit_stream(paced, byte_count))
    }

    async fn send_upload_chunk(&self, payload: Bytes) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoints.upload_url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .timeout(self.timeout)
            .body(payload)
            .send()
            .await?;
        ensure_success(response.status(), "Upload endpoint")?;
        // Drain so the connection can be reused by the next chunk
        response.bytes().await?;
        Ok(())
    }
}

/// Utility functions for HTTP operations
pub struct HttpUtils;

impl HttpUtils {
    /// Validate URL format
    pub fn validate_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::validation(format!("Invalid URL format: {}", e)))?;

        match parsed.scheme() {
            "http" | "https" => {},
            scheme => return Err(AppError::validation(format!("Unsupported URL scheme: {}", scheme))),
        }

        if parsed.host().is_none() {
            return Err(AppError::validation("URL must have a host"));
        }

        Ok(())
    }

    /// Extract domain from URL
    pub fn extract_domain(url: &str) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::parse(format!("Invalid URL: {}", e)))?;

        parsed.host_str()
            .ok_or_else(|| AppError::validation("URL must have a host"))
            .map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_sized_download_url() {
        let endpoint = DownloadEndpoint::Sized("https://speed.cloudflare.com/__down".to_string());
        let url = endpoint.request_url(25_000_000).unwrap();
        assert_eq!(url.as_str(), "https://speed.cloudflare.com/__down?bytes=25000000");
    }

    #[test]
    fn test_fixed_download_url_ignores_size() {
        let endpoint = DownloadEndpoint::Fixed("https://speed.hetzner.de/100MB.bin".to_string());
        let url = endpoint.request_url(1_000).unwrap();
        assert_eq!(url.as_str(), "https://speed.hetzner.de/100MB.bin");
    }

    #[test]
    fn test_sized_endpoints_ping_with_zero_bytes() {
        let endpoints = HttpEndpoints::sized(
            "https://speed.cloudflare.com/__down",
            "https://speed.cloudflare.com/__up",
        )
        .unwrap();
        assert_eq!(endpoints.ping_url, "https://speed.cloudflare.com/__down?bytes=0");
    }

    #[test]
    fn test_transport_rejects_invalid_endpoints() {
        let endpoints = HttpEndpoints {
            download: DownloadEndpoint::Sized("ftp://example.com/file".to_string()),
            upload_url: "https://example.com/up".to_string(),
            ping_url: "https://example.com/".to_string(),
        };
        let result = HttpTransport::new(endpoints, Duration::from_secs(5));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_limit_stream_truncates_last_chunk() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from(vec![0u8; 400])),
            Ok(Bytes::from(vec![0u8; 400])),
            Ok(Bytes::from(vec![0u8; 400])),
        ];
        let limited = limit_stream(stream::iter(chunks).boxed(), 1_000);
        let sizes: Vec<usize> = limited
            .map(|chunk| chunk.map(|c| c.len()).unwrap_or(0))
            .collect()
            .await;
        assert_eq!(sizes, vec![400, 400, 200]);
    }

    #[tokio::test]
    async fn test_limit_stream_passes_errors_through() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(AppError::transfer("connection reset")),
        ];
        let results: Vec<Result<Bytes>> = limit_stream(stream::iter(chunks).boxed(), 100)
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }

    /// Chunks of `size` bytes, each arriving `every` after the previous one
    fn timed_chunks(count: usize, size: usize, every: Duration) -> ChunkStream {
        stream::iter(0..count)
            .then(move |_| async move {
                tokio::time::sleep(every).await;
                Ok(Bytes::from(vec![0u8; size]))
            })
            .boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_stream_cap_ends_without_error() {
        // Steady 1000 bytes per 100 ms, far slower than the whole body needs
        let chunks = timed_chunks(50, 1_000, Duration::from_millis(100));
        let results: Vec<Result<Bytes>> = pace_stream(chunks, Duration::from_secs(1), Duration::from_millis(350))
            .collect()
            .await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_stream_stall_is_timeout() {
        let chunks = timed_chunks(1, 500, Duration::from_millis(10)).chain(stream::pending()).boxed();
        let results: Vec<Result<Bytes>> = pace_stream(chunks, Duration::from_millis(200), Duration::from_secs(60))
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().map(|c| c.len()).ok(), Some(500));
        assert!(matches!(results[1], Err(AppError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_stream_passes_complete_body() {
        let chunks = timed_chunks(4, 250, Duration::from_millis(50));
        let total: usize = pace_stream(chunks, Duration::from_secs(1), Duration::from_secs(60))
            .map(|chunk| chunk.map(|c| c.len()).unwrap_or(0))
            .collect::<Vec<_>>()
            .await
            .iter()
            .sum();
        assert_eq!(total, 1_000);
    }

    #[test]
    fn test_download_cap_builder() {
        let endpoints = HttpEndpoints::sized("https://example.com/__down", "https://example.com/__up").unwrap();
        let transport = HttpTransport::new(endpoints, Duration::from_secs(5)).unwrap();
        assert_eq!(transport.download_cap, crate::defaults::DOWNLOAD_STREAM_CAP);
        assert_eq!(transport.with_download_cap(Duration::from_secs(10)).download_cap, Duration::from_secs(10));
    }

    #[test]
    fn test_http_utils() {
        assert!(HttpUtils::validate_url("https://example.com").is_ok());
        assert!(HttpUtils::validate_url("mailto:someone@example.com").is_err());
        assert_eq!(
            HttpUtils::extract_domain("http://proof.ovh.net/files/100Mb.dat").unwrap(),
            "proof.ovh.net"
        );
    }
}
