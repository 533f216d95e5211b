//! bloomg Client
//!
//! Talks to a remote bloomg server that owns a set of named bloom filters.
//! The server does all the probabilistic work; this crate shapes requests.
//!
//! Architecture:
//! 1. [`Client`] creates and lists filters, caching known names
//! 2. [`FilterHandle`] proxies single calls for one filter
//! 3. [`Pipeline`] batches bulk/multi operations and replays them in order
//! 4. [`Transport`] carries the calls, as JSON/HTTP or as binary RPC

mod client;
mod config;
mod error;
mod filter;
mod pipeline;
pub mod transport;

pub use client::{Client, DEFAULT_CACHE_TTL};
pub use config::{ClientConfig, TransportKind};
pub use error::{BloomgError, ErrorCategory, Operation, Result};
pub use filter::FilterHandle;
pub use pipeline::{OpKind, Outcome, Pipeline, PipelineOp};
pub use transport::{AnyTransport, FilterInfo, HttpTransport, RpcTransport, Transport};
