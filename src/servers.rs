//! Built-in speed test servers and latency-based ranking

use crate::client::{DownloadEndpoint, HttpEndpoints, HttpTransport};
use crate::error::{AppError, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// A speed test server known to the tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedServer {
    pub name: String,
    pub location: String,
    pub download_url: String,
    /// Whether the server honours the `bytes` query parameter
    pub sized_download: bool,
    /// Servers without an upload endpoint borrow the default one
    pub upload_url: Option<String>,
    pub ping_url: String,
}

impl SpeedServer {
    /// Endpoints a transport needs to run a full session against this server
    pub fn endpoints(&self) -> Result<HttpEndpoints> {
        let upload_url = self
            .upload_url
            .clone()
            .unwrap_or_else(|| crate::defaults::DEFAULT_UPLOAD_URL.to_string());

        if self.sized_download {
            let mut endpoints = HttpEndpoints::sized(&self.download_url, &upload_url)?;
            endpoints.ping_url = self.ping_url.clone();
            Ok(endpoints)
        } else {
            Ok(HttpEndpoints {
                download: DownloadEndpoint::Fixed(self.download_url.clone()),
                upload_url,
                ping_url: self.ping_url.clone(),
            })
        }
    }

    pub fn has_upload(&self) -> bool {
        self.upload_url.is_some()
    }
}

/// Outcome of probing one server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub server: SpeedServer,
    pub latency_ms: Option<u64>,
    pub available: bool,
}

/// Servers ordered fastest first, unreachable ones last
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRanking {
    pub servers: Vec<ServerStatus>,
}

impl ServerRanking {
    /// The fastest reachable server, or the first entry when none answered
    pub fn recommended(&self) -> Option<&ServerStatus> {
        self.servers
            .iter()
            .find(|s| s.available)
            .or_else(|| self.servers.first())
    }

    pub fn available_count(&self) -> usize {
        self.servers.iter().filter(|s| s.available).count()
    }
}

/// Catalog of selectable servers
#[derive(Debug, Clone)]
pub struct ServerCatalog {
    servers: Vec<SpeedServer>,
}

impl Default for ServerCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ServerCatalog {
    /// Cloudflare, Hetzner and OVH
    pub fn builtin() -> Self {
        let cloudflare_ping = DownloadEndpoint::Sized(crate::defaults::DEFAULT_DOWNLOAD_URL.to_string())
            .request_url(0)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}?bytes=0", crate::defaults::DEFAULT_DOWNLOAD_URL));

        Self {
            servers: vec![
                SpeedServer {
                    name: crate::defaults::DEFAULT_SERVER.to_string(),
                    location: "Global CDN".to_string(),
                    download_url: crate::defaults::DEFAULT_DOWNLOAD_URL.to_string(),
                    sized_download: true,
                    upload_url: Some(crate::defaults::DEFAULT_UPLOAD_URL.to_string()),
                    ping_url: cloudflare_ping,
                },
                SpeedServer {
                    name: "Hetzner".to_string(),
                    location: "Germany".to_string(),
                    download_url: "https://speed.hetzner.de/100MB.bin".to_string(),
                    sized_download: false,
                    upload_url: None,
                    ping_url: "https://speed.hetzner.de/".to_string(),
                },
                SpeedServer {
                    name: "OVH".to_string(),
                    location: "France".to_string(),
                    download_url: "http://proof.ovh.net/files/100Mb.dat".to_string(),
                    sized_download: false,
                    upload_url: None,
                    ping_url: "http://proof.ovh.net/".to_string(),
                },
            ],
        }
    }

    pub fn from_servers(servers: Vec<SpeedServer>) -> Self {
        Self { servers }
    }

    pub fn servers(&self) -> &[SpeedServer] {
        &self.servers
    }

    /// Case-insensitive lookup by name
    pub fn find(&self, name: &str) -> Option<&SpeedServer> {
        let name = name.trim();
        self.servers.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Result<&SpeedServer> {
        self.find(name).ok_or_else(|| {
            let known: Vec<&str> = self.servers.iter().map(|s| s.name.as_str()).collect();
            AppError::config(format!(
                "Unknown server '{}'. Available servers: {}",
                name,
                known.join(", ")
            ))
        })
    }

    /// Probe every ping URL once with a HEAD request
    pub async fn rank(&self, transport: &HttpTransport, timeout: Duration) -> ServerRanking {
        self.rank_with(|url| async move { transport.head_latency(&url, timeout).await })
            .await
    }

    /// Rank servers with a custom probe; all probes run concurrently
    pub async fn rank_with<F, Fut>(&self, mut probe: F) -> ServerRanking
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<Duration>>,
    {
        let probes: Vec<Fut> = self.servers.iter().map(|s| probe(s.ping_url.clone())).collect();
        let outcomes = join_all(probes).await;

        let mut servers: Vec<ServerStatus> = self
            .servers
            .iter()
            .zip(outcomes)
            .map(|(server, outcome)| match outcome {
                Ok(latency) => ServerStatus {
                    server: server.clone(),
                    latency_ms: Some(latency.as_millis() as u64),
                    available: true,
                },
                Err(_) => ServerStatus {
                    server: server.clone(),
                    latency_ms: None,
                    available: false,
                },
            })
            .collect();

        servers.sort_by_key(|s| (!s.available, s.latency_ms.unwrap_or(u64::MAX)));
        ServerRanking { servers }
    }
}
