//! Filter Handle
//!
//! Thin proxy for one named remote filter. Every method is exactly one
//! transport call; failures are logged and handed back to the caller.

use crate::error::{BloomgError, Operation, Result};
use crate::pipeline::Pipeline;
use crate::transport::{FilterInfo, Transport};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Handle to a single remote filter
pub struct FilterHandle<T: Transport> {
    transport: Arc<T>,
    name: String,
}

impl<T: Transport> FilterHandle<T> {
    pub fn new(transport: Arc<T>, name: impl Into<String>) -> Self {
        Self {
            transport,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert one key
    pub async fn add(&self, key: impl Into<String>) -> Result<()> {
        let keys = [key.into()];
        let result = self.transport.add(&self.name, &keys).await;
        self.logged(Operation::Add, result)
    }

    /// Insert several keys in one call
    pub async fn bulk<I, S>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let result = self.transport.add(&self.name, &keys).await;
        self.logged(Operation::Bulk, result)
    }

    /// Check whether one key is present
    pub async fn has(&self, key: impl Into<String>) -> Result<bool> {
        let keys = [key.into()];
        let result = self
            .transport
            .has(&self.name, &keys)
            .await
            .and_then(|found| self.aligned(Operation::Has, &keys, found))
            .map(|found| found[0]);
        self.logged(Operation::Has, result)
    }

    /// Check several keys in one call, one boolean per key
    pub async fn multi<I, S>(&self, keys: I) -> Result<Vec<bool>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let result = self
            .transport
            .has(&self.name, &keys)
            .await
            .and_then(|found| self.aligned(Operation::Multi, &keys, found));
        self.logged(Operation::Multi, result)
    }

    /// Delete the filter from the server. This is permanent.
    pub async fn drop(&self) -> Result<()> {
        let result = self.transport.drop_filter(&self.name).await;
        self.logged(Operation::Drop, result)
    }

    /// Remove every key from the filter
    pub async fn clear(&self) -> Result<()> {
        let result = self.transport.clear(&self.name).await;
        self.logged(Operation::Clear, result)
    }

    /// Unload the filter from server memory
    pub async fn close(&self) -> Result<()> {
        let result = self.transport.close(&self.name).await;
        self.logged(Operation::Close, result)
    }

    pub async fn info(&self) -> Result<FilterInfo> {
        let result = self.transport.info(&self.name).await;
        self.logged(Operation::Info, result)
    }

    /// Start a pipeline on the same transport
    pub fn pipeline(&self) -> Pipeline<T> {
        Pipeline::new(self.transport.clone())
    }

    fn aligned(&self, op: Operation, keys: &[String], found: Vec<bool>) -> Result<Vec<bool>> {
        if found.len() != keys.len() {
            return Err(BloomgError::Malformed {
                op,
                filter: Some(self.name.clone()),
                reason: format!("expected {} results, got {}", keys.len(), found.len()),
            });
        }
        Ok(found)
    }

    fn logged<R>(&self, op: Operation, result: Result<R>) -> Result<R> {
        result.map_err(|e| {
            let e = e.relabel(op);
            warn!("{} failed: {}: {}", op, self.name, e);
            e
        })
    }
}

impl<T: Transport> Clone for FilterHandle<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            name: self.name.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for FilterHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterHandle")
            .field("name", &self.name)
            .field("transport", &self.transport.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::transport::mock::MockTransport;

    fn handle(mock: MockTransport, name: &str) -> (Arc<MockTransport>, FilterHandle<MockTransport>) {
        let transport = Arc::new(mock);
        (transport.clone(), FilterHandle::new(transport, name))
    }

    #[tokio::test]
    async fn test_add_then_has() {
        let (_, filter) = handle(MockTransport::new().with_filter("F", &[]), "F");

        filter.add("a").await.unwrap();
        assert!(filter.has("a").await.unwrap());
        assert!(!filter.has("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_and_multi() {
        let (mock, filter) = handle(MockTransport::new().with_filter("F", &[]), "F");

        filter.bulk(["a", "b"]).await.unwrap();
        assert_eq!(filter.multi(["a", "b", "c"]).await.unwrap(), vec![true, true, false]);

        // One transport call per method
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_errors_carry_operation_and_name() {
        let (_, filter) = handle(MockTransport::new().failing("F"), "F");

        let err = filter.bulk(["a"]).await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::Bulk));
        assert_eq!(err.filter(), Some("F"));
        assert_eq!(err.category(), ErrorCategory::Status);

        let err = filter.multi(["a"]).await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::Multi));
    }

    #[tokio::test]
    async fn test_drop_clear_info() {
        let (mock, filter) = handle(MockTransport::new().with_filter("F", &["a", "b"]), "F");

        assert_eq!(filter.info().await.unwrap().get("size").map(String::as_str), Some("2"));
        filter.clear().await.unwrap();
        assert!(!mock.contains("F", "a"));
        filter.close().await.unwrap();
        filter.drop().await.unwrap();

        // Gone after drop
        assert!(filter.has("a").await.is_err());
    }

    #[tokio::test]
    async fn test_pipeline_shares_transport() {
        let (mock, filter) = handle(MockTransport::new().with_filter("F", &[]), "F");

        let mut pipe = filter.pipeline();
        pipe.bulk(filter.name(), ["z"]);
        pipe.execute().await.unwrap();

        assert!(mock.contains("F", "z"));
    }
}
