//! Transports
//!
//! A transport carries the handful of remote calls the client needs. Two
//! encodings exist side by side:
//!
//! - [`HttpTransport`]: JSON bodies over HTTP, status 200 means success
//! - [`RpcTransport`]: length-prefixed protobuf over TCP, code 0 means success
//!
//! Everything above this module (filters, pipelines, the registry) is
//! written against the [`Transport`] trait only.

mod http;
mod proto;
mod rpc;

pub use http::HttpTransport;
pub use proto::{rpc_request, FilterRequest, ListRequest, RpcRequest, RpcResponse};
pub use rpc::RpcTransport;

#[cfg(test)]
pub(crate) use http::test_server;

use crate::config::{ClientConfig, TransportKind};
use crate::error::Result;
use std::collections::BTreeMap;
use std::future::Future;

/// Server-reported properties of one filter
pub type FilterInfo = BTreeMap<String, String>;

/// The remote calls a bloomg server answers.
///
/// Each method performs exactly one round-trip and reports failure through
/// [`BloomgError`](crate::BloomgError); nothing is retried.
pub trait Transport: Send + Sync {
    /// Short name used in logs and errors
    fn kind(&self) -> &'static str;

    /// Create a filter
    fn create(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// List filter names known to the server
    fn list(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Insert keys into a filter
    fn add(&self, name: &str, keys: &[String]) -> impl Future<Output = Result<()>> + Send;

    /// Check keys against a filter, one boolean per key
    fn has(&self, name: &str, keys: &[String]) -> impl Future<Output = Result<Vec<bool>>> + Send;

    /// Delete a filter permanently
    fn drop_filter(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remove all keys from a filter
    fn clear(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Unload a filter from server memory
    fn close(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Fetch filter properties
    fn info(&self, name: &str) -> impl Future<Output = Result<FilterInfo>> + Send;
}

/// Transport picked at runtime from a [`ClientConfig`]
pub enum AnyTransport {
    Http(HttpTransport),
    Rpc(RpcTransport),
}

impl AnyTransport {
    /// Build the transport named by the configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(match config.transport {
            TransportKind::Http => Self::Http(HttpTransport::from_config(config)?),
            TransportKind::Rpc => Self::Rpc(RpcTransport::from_config(config)),
        })
    }
}

impl Transport for AnyTransport {
    fn kind(&self) -> &'static str {
        match self {
            Self::Http(t) => t.kind(),
            Self::Rpc(t) => t.kind(),
        }
    }

    async fn create(&self, name: &str) -> Result<()> {
        match self {
            Self::Http(t) => t.create(name).await,
            Self::Rpc(t) => t.create(name).await,
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        match self {
            Self::Http(t) => t.list().await,
            Self::Rpc(t) => t.list().await,
        }
    }

    async fn add(&self, name: &str, keys: &[String]) -> Result<()> {
        match self {
            Self::Http(t) => t.add(name, keys).await,
            Self::Rpc(t) => t.add(name, keys).await,
        }
    }

    async fn has(&self, name: &str, keys: &[String]) -> Result<Vec<bool>> {
        match self {
            Self::Http(t) => t.has(name, keys).await,
            Self::Rpc(t) => t.has(name, keys).await,
        }
    }

    async fn drop_filter(&self, name: &str) -> Result<()> {
        match self {
            Self::Http(t) => t.drop_filter(name).await,
            Self::Rpc(t) => t.drop_filter(name).await,
        }
    }

    async fn clear(&self, name: &str) -> Result<()> {
        match self {
            Self::Http(t) => t.clear(name).await,
            Self::Rpc(t) => t.clear(name).await,
        }
    }

    async fn close(&self, name: &str) -> Result<()> {
        match self {
            Self::Http(t) => t.close(name).await,
            Self::Rpc(t) => t.close(name).await,
        }
    }

    async fn info(&self, name: &str) -> Result<FilterInfo> {
        match self {
            Self::Http(t) => t.info(name).await,
            Self::Rpc(t) => t.info(name).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory transport double recording every call.

    use super::{FilterInfo, Transport};
    use crate::error::{BloomgError, Operation, Result};
    use std::collections::{BTreeMap, BTreeSet, HashSet};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Call {
        pub op: Operation,
        pub filter: Option<String>,
        pub keys: Vec<String>,
    }

    /// Filters live in a map; names listed in `failing` answer with status 500.
    #[derive(Default)]
    pub struct MockTransport {
        filters: Mutex<BTreeMap<String, BTreeSet<String>>>,
        failing: Mutex<HashSet<String>>,
        calls: Mutex<Vec<Call>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_filter(self, name: &str, keys: &[&str]) -> Self {
            self.filters.lock().unwrap().insert(
                name.to_string(),
                keys.iter().map(|k| k.to_string()).collect(),
            );
            self
        }

        pub fn failing(self, name: &str) -> Self {
            self.failing.lock().unwrap().insert(name.to_string());
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn contains(&self, name: &str, key: &str) -> bool {
            self.filters
                .lock()
                .unwrap()
                .get(name)
                .is_some_and(|keys| keys.contains(key))
        }

        fn record(&self, op: Operation, filter: Option<&str>, keys: &[String]) -> Result<()> {
            self.calls.lock().unwrap().push(Call {
                op,
                filter: filter.map(str::to_string),
                keys: keys.to_vec(),
            });

            match filter {
                Some(name) if self.failing.lock().unwrap().contains(name) => {
                    Err(BloomgError::Status {
                        op,
                        filter: Some(name.to_string()),
                        status: 500,
                        message: "Internal Server Error".to_string(),
                    })
                }
                _ => Ok(()),
            }
        }

        fn missing(op: Operation, name: &str) -> BloomgError {
            BloomgError::Status {
                op,
                filter: Some(name.to_string()),
                status: 404,
                message: "Not Found".to_string(),
            }
        }
    }

    impl Transport for MockTransport {
        fn kind(&self) -> &'static str {
            "mock"
        }

        async fn create(&self, name: &str) -> Result<()> {
            self.record(Operation::Create, Some(name), &[])?;
            self.filters.lock().unwrap().entry(name.to_string()).or_default();
            Ok(())
        }

        async fn list(&self) -> Result<Vec<String>> {
            self.record(Operation::List, None, &[])?;
            Ok(self.filters.lock().unwrap().keys().cloned().collect())
        }

        async fn add(&self, name: &str, keys: &[String]) -> Result<()> {
            self.record(Operation::Add, Some(name), keys)?;
            let mut filters = self.filters.lock().unwrap();
            let set = filters.get_mut(name).ok_or_else(|| Self::missing(Operation::Add, name))?;
            set.extend(keys.iter().cloned());
            Ok(())
        }

        async fn has(&self, name: &str, keys: &[String]) -> Result<Vec<bool>> {
            self.record(Operation::Has, Some(name), keys)?;
            let filters = self.filters.lock().unwrap();
            let set = filters.get(name).ok_or_else(|| Self::missing(Operation::Has, name))?;
            Ok(keys.iter().map(|k| set.contains(k)).collect())
        }

        async fn drop_filter(&self, name: &str) -> Result<()> {
            self.record(Operation::Drop, Some(name), &[])?;
            self.filters
                .lock()
                .unwrap()
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| Self::missing(Operation::Drop, name))
        }

        async fn clear(&self, name: &str) -> Result<()> {
            self.record(Operation::Clear, Some(name), &[])?;
            let mut filters = self.filters.lock().unwrap();
            let set = filters.get_mut(name).ok_or_else(|| Self::missing(Operation::Clear, name))?;
            set.clear();
            Ok(())
        }

        async fn close(&self, name: &str) -> Result<()> {
            self.record(Operation::Close, Some(name), &[])
        }

        async fn info(&self, name: &str) -> Result<FilterInfo> {
            self.record(Operation::Info, Some(name), &[])?;
            let filters = self.filters.lock().unwrap();
            let set = filters.get(name).ok_or_else(|| Self::missing(Operation::Info, name))?;
            let mut info = FilterInfo::new();
            info.insert("size".to_string(), set.len().to_string());
            Ok(info)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_transport_from_config() {
        let http = AnyTransport::from_config(&ClientConfig::http("http://localhost:8080")).unwrap();
        assert_eq!(http.kind(), "http");

        let rpc = AnyTransport::from_config(&ClientConfig::rpc("127.0.0.1:9090")).unwrap();
        assert_eq!(rpc.kind(), "rpc");
    }

    #[test]
    fn test_any_transport_rejects_invalid_config() {
        let result = AnyTransport::from_config(&ClientConfig::http("gopher://nowhere"));
        assert!(result.is_err());
    }
}
