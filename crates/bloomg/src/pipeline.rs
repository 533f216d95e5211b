//! Pipelined Commands
//!
//! A [`Pipeline`] buffers bulk-insert and multi-check operations locally and
//! replays them against the server when [`Pipeline::execute`] is called.
//!
//! Execution is sequential: one call is awaited before the next is sent, in
//! the order the operations were queued. A failing operation becomes an
//! `Err` entry in the result list and the remaining operations still run.
//!
//! ```rust,ignore
//! let mut pipe = client.pipeline();
//! pipe.bulk("users", ["alice", "bob"])
//!     .multi("users", ["alice", "carol"]);
//!
//! for outcome in pipe.execute().await? {
//!     match outcome {
//!         Ok(Outcome::Added) => {}
//!         Ok(Outcome::Checked(found)) => println!("{:?}", found),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```

use crate::error::{BloomgError, Operation, Result};
use crate::transport::Transport;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Kind of a queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Insert many keys
    Bulk,
    /// Check many keys
    Multi,
}

impl OpKind {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Bulk => Operation::Bulk,
            Self::Multi => Operation::Multi,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.operation(), f)
    }
}

/// One buffered operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOp {
    pub kind: OpKind,
    pub filter: String,
    pub keys: Vec<String>,
}

/// Successful outcome of one pipelined operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Keys were inserted
    Added,
    /// Membership for each submitted key, in submission order
    Checked(Vec<bool>),
}

impl Outcome {
    /// Membership results, if this was a multi
    pub fn checked(&self) -> Option<&[bool]> {
        match self {
            Self::Checked(found) => Some(found),
            Self::Added => None,
        }
    }
}

/// Batch of bulk/multi operations executed in submission order
pub struct Pipeline<T: Transport> {
    transport: Arc<T>,
    ops: Vec<PipelineOp>,
    /// Most recently queued kind; `None` until the first bulk or multi
    kind: Option<OpKind>,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            ops: Vec::new(),
            kind: None,
        }
    }

    /// Queue a bulk insert of `keys` into `filter`
    pub fn bulk<I, S>(&mut self, filter: impl Into<String>, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(OpKind::Bulk, filter.into(), keys)
    }

    /// Queue a membership check of `keys` against `filter`
    pub fn multi<I, S>(&mut self, filter: impl Into<String>, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(OpKind::Multi, filter.into(), keys)
    }

    fn push<I, S>(&mut self, kind: OpKind, filter: String, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = Some(kind);
        self.ops.push(PipelineOp {
            kind,
            filter,
            keys: keys.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Append another pipeline's buffered operations after ours.
    ///
    /// `other` is left as it was, so it can still be executed on its own.
    pub fn merge(&mut self, other: &Pipeline<T>) -> &mut Self {
        self.ops.extend(other.ops.iter().cloned());
        if self.kind.is_none() {
            self.kind = other.kind;
        }
        self
    }

    /// Run every buffered operation in order and drain the buffer.
    ///
    /// Returns one entry per queued operation. Only a pipeline that never
    /// had an operation queued fails as a whole, with
    /// [`BloomgError::KindUnset`].
    pub async fn execute(&mut self) -> Result<Vec<Result<Outcome>>> {
        if self.kind.is_none() {
            return Err(BloomgError::KindUnset);
        }

        let ops = std::mem::take(&mut self.ops);
        debug!("Executing pipeline of {} operations", ops.len());

        let mut results = Vec::with_capacity(ops.len());
        for op in &ops {
            let outcome = self.run(op).await;
            if let Err(ref e) = outcome {
                warn!("Pipeline {} failed: {}", op.kind, e);
            }
            results.push(outcome);
        }

        Ok(results)
    }

    async fn run(&self, op: &PipelineOp) -> Result<Outcome> {
        match op.kind {
            OpKind::Bulk => {
                self.transport
                    .add(&op.filter, &op.keys)
                    .await
                    .map_err(|e| e.relabel(Operation::Bulk))?;
                Ok(Outcome::Added)
            }
            OpKind::Multi => {
                let found = self
                    .transport
                    .has(&op.filter, &op.keys)
                    .await
                    .map_err(|e| e.relabel(Operation::Multi))?;
                if found.len() != op.keys.len() {
                    return Err(BloomgError::Malformed {
                        op: Operation::Multi,
                        filter: Some(op.filter.clone()),
                        reason: format!("expected {} results, got {}", op.keys.len(), found.len()),
                    });
                }
                Ok(Outcome::Checked(found))
            }
        }
    }

    /// Number of buffered operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Most recently queued kind
    pub fn kind(&self) -> Option<OpKind> {
        self.kind
    }

    pub fn operations(&self) -> &[PipelineOp] {
        &self.ops
    }
}

impl<T: Transport> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("transport", &self.transport.kind())
            .field("ops", &self.ops)
            .field("kind", &self.kind)
            .finish()
    }
}
