//! Client and Filter Registry
//!
//! Entry point of the library. Creates and lists filters, and hands out
//! [`FilterHandle`]s and [`Pipeline`]s that share the client's transport.
//!
//! Filter names are cached: existence changes rarely, so `filter(name)`
//! only asks the server when the cache is stale or does not know the name.
//!
//! ```rust,ignore
//! let client = Client::connect(&ClientConfig::http("http://localhost:8080"))?;
//! let users = client.create_filter("users").await?;
//! users.bulk(["alice", "bob"]).await?;
//! assert!(users.has("alice").await?);
//! ```

use crate::config::ClientConfig;
use crate::error::{BloomgError, Result};
use crate::filter::FilterHandle;
use crate::pipeline::Pipeline;
use crate::transport::{AnyTransport, Transport};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default freshness window of the filter name cache
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Snapshot of the server's filter names
struct NameCache {
    names: HashSet<String>,
    fetched_at: Instant,
}

/// Client for one bloomg server
pub struct Client<T: Transport> {
    transport: Arc<T>,
    cache: RwLock<Option<NameCache>>,
    cache_ttl: Duration,
}

impl Client<AnyTransport> {
    /// Build a client from configuration, picking the transport it names
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = AnyTransport::from_config(config)?;
        info!("Client configured for {} ({} transport)", config.server, config.transport);
        Ok(Self::with_cache_ttl(transport, config.cache_ttl()))
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self::with_cache_ttl(transport, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(transport: T, cache_ttl: Duration) -> Self {
        Self {
            transport: Arc::new(transport),
            cache: RwLock::new(None),
            cache_ttl,
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Create a filter on the server
    pub async fn create_filter(&self, name: &str) -> Result<FilterHandle<T>> {
        validate_name(name)?;
        self.transport.create(name).await?;

        if let Some(cache) = self.cache.write().await.as_mut() {
            cache.names.insert(name.to_string());
        }

        info!("Created filter {}", name);
        Ok(FilterHandle::new(self.transport.clone(), name))
    }

    /// Ask the server for every filter name. Always remote; refreshes the cache.
    pub async fn list_filters(&self) -> Result<Vec<String>> {
        let names = self.transport.list().await?;

        *self.cache.write().await = Some(NameCache {
            names: names.iter().cloned().collect(),
            fetched_at: Instant::now(),
        });

        Ok(names)
    }

    /// Handle to an existing filter.
    ///
    /// Uses the cached name list when it is fresh and contains `name`;
    /// otherwise refreshes it once before giving up with
    /// [`BloomgError::FilterNotFound`].
    pub async fn filter(&self, name: &str) -> Result<FilterHandle<T>> {
        validate_name(name)?;

        let cached = {
            let cache = self.cache.read().await;
            cache
                .as_ref()
                .filter(|c| c.fetched_at.elapsed() <= self.cache_ttl)
                .map(|c| c.names.contains(name))
        };

        match cached {
            Some(true) => debug!("Filter cache hit for {}", name),
            _ => {
                debug!("Filter cache refresh for {}", name);
                let names = self.list_filters().await?;
                if !names.iter().any(|n| n == name) {
                    return Err(BloomgError::FilterNotFound(name.to_string()));
                }
            }
        }

        Ok(FilterHandle::new(self.transport.clone(), name))
    }

    /// Start an empty pipeline on this client's transport
    pub fn pipeline(&self) -> Pipeline<T> {
        Pipeline::new(self.transport.clone())
    }

    /// Forget cached filter names
    pub async fn invalidate_cache(&self) {
        *self.cache.write().await = None;
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BloomgError::InvalidFilterName);
    }
    Ok(())
}
