use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bevy::log::debug;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode, Url};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{ConfigError, TileError};
use crate::resources::settings::NetworkSettings;

/// Fetches raw tile bytes for a URL.
///
/// The loader only talks to this trait, so the HTTP stack can be swapped for
/// an in-memory fake in tests.
#[async_trait]
pub trait TileFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileError>;
}

/// Hands out at most `per_host` concurrent permits for each remote host
#[derive(Debug)]
pub struct HostLimiter {
    per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimiter {
    pub fn new(per_host: usize) -> Self {
        Self {
            per_host: per_host.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn semaphore(&self, host: &str) -> Arc<Semaphore> {
        self.hosts
            .lock()
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
            .clone()
    }

    /// Wait for a free slot on `host`. The slot is released when the permit
    /// is dropped, including when the waiting task is aborted.
    pub async fn acquire(&self, host: &str) -> Result<OwnedSemaphorePermit, TileError> {
        self.semaphore(host)
            .acquire_owned()
            .await
            .map_err(|_| TileError::Transport(format!("connection limiter for {host} closed")))
    }

    /// Permits currently free for `host`
    pub fn available(&self, host: &str) -> usize {
        self.semaphore(host).available_permits()
    }
}

/// `reqwest`-backed fetcher with a per-host concurrency cap
pub struct HttpFetcher {
    client: Client,
    limiter: HostLimiter,
}

impl HttpFetcher {
    pub fn new(settings: &NetworkSettings) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .pool_max_idle_per_host(settings.max_conns_per_host)
            .build()?;

        Ok(Self {
            client,
            limiter: HostLimiter::new(settings.max_conns_per_host),
        })
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileError> {
        let parsed = Url::parse(url).map_err(|e| TileError::Transport(format!("bad URL {url}: {e}")))?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        let _permit = self.limiter.acquire(&host).await?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| TileError::Transport(e.to_string()))?;

        let status = response.status();
        debug!("{}: {}", url, status);
        if status == StatusCode::NOT_FOUND {
            return Err(TileError::NotFound);
        }
        if !status.is_success() {
            return Err(TileError::Http(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TileError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
