//! Binary RPC Transport
//!
//! Speaks protobuf messages over a single TCP connection. Each frame is a
//! big-endian `u32` length followed by the encoded message. Calls are
//! strictly request/response; the connection is opened lazily and dropped
//! after any I/O failure, timeout or cancelled call so the next call
//! reconnects.

use super::proto::{rpc_request::Call, FilterRequest, ListRequest, RpcRequest, RpcResponse};
use super::{FilterInfo, Transport};
use crate::config::ClientConfig;
use crate::error::{BloomgError, Operation, Result};
use prost::Message;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Write one length-prefixed message
pub(crate) async fn write_frame<M: Message>(stream: &mut TcpStream, message: &M) -> std::io::Result<()> {
    let body = message.encode_to_vec();
    let len = u32::try_from(body.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame too large"))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await
}

/// Read one length-prefixed frame, refusing frames above `max_len`
pub(crate) async fn read_frame(stream: &mut TcpStream, max_len: usize) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit of {}", len, max_len),
        ));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(body)
}

/// Protobuf-over-TCP transport
pub struct RpcTransport {
    /// `host:port` of the server
    addr: String,
    /// Per-call deadline
    timeout: Duration,
    /// Largest accepted response frame
    max_frame_size: usize,
    /// Open connection, if any
    conn: Mutex<Option<TcpStream>>,
}

impl RpcTransport {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        let addr = addr.into();
        info!("RPC transport initialized ({}, timeout: {:?})", addr, timeout);

        Self {
            addr,
            timeout,
            max_frame_size: 10 * 1024 * 1024,
            conn: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut transport = Self::new(config.server.clone(), config.timeout());
        transport.max_frame_size = config.max_body_size;
        transport
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Write the request and read one reply frame on the shared connection.
    ///
    /// The stream is taken out of the slot for the exchange and only put
    /// back after a complete reply, so a failed, timed out or cancelled
    /// call leaves no half-read connection for the next caller. The
    /// deadline starts once the connection lock is held.
    async fn exchange(&self, op: Operation, filter: Option<&str>, request: &RpcRequest) -> Result<Vec<u8>> {
        let mut conn = self.conn.lock().await;
        let idle = conn.take();
        let addr = self.addr.as_str();
        let max_frame_size = self.max_frame_size;

        let io = async move {
            let mut stream = match idle {
                Some(stream) => stream,
                None => {
                    debug!("RPC connecting to {}", addr);
                    let stream = TcpStream::connect(addr).await?;
                    stream.set_nodelay(true)?;
                    stream
                }
            };
            write_frame(&mut stream, request).await?;
            let frame = read_frame(&mut stream, max_frame_size).await?;
            Ok::<_, std::io::Error>((stream, frame))
        };

        match tokio::time::timeout(self.timeout, io).await {
            Ok(Ok((stream, frame))) => {
                *conn = Some(stream);
                Ok(frame)
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!("RPC {} got oversized frame: {}", op, e);
                Err(BloomgError::Malformed {
                    op,
                    filter: filter.map(str::to_string),
                    reason: e.to_string(),
                })
            }
            Ok(Err(e)) => {
                warn!("RPC {} failed: {}", op, e);
                Err(BloomgError::Transport {
                    op,
                    filter: filter.map(str::to_string),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!("RPC {} timed out after {:?}", op, self.timeout);
                Err(BloomgError::Timeout {
                    op,
                    filter: filter.map(str::to_string),
                    after: self.timeout,
                })
            }
        }
    }

    /// Send a request and decode its reply
    async fn call(&self, op: Operation, filter: Option<&str>, request: RpcRequest) -> Result<RpcResponse> {
        let frame = self.exchange(op, filter, &request).await?;
        let filter_owned = filter.map(str::to_string);

        let response = RpcResponse::decode(frame.as_slice()).map_err(|e| BloomgError::Malformed {
            op,
            filter: filter_owned.clone(),
            reason: e.to_string(),
        })?;

        debug!("RPC {} {} -> code {}", op, filter.unwrap_or("-"), response.code);

        if !response.is_ok() {
            return Err(BloomgError::Status {
                op,
                filter: filter_owned,
                status: i64::from(response.code),
                message: response.message,
            });
        }

        Ok(response)
    }

    async fn filter_call(
        &self,
        op: Operation,
        name: &str,
        keys: &[String],
        wrap: fn(FilterRequest) -> Call,
    ) -> Result<RpcResponse> {
        let request = RpcRequest {
            call: Some(wrap(FilterRequest {
                filter_name: name.to_string(),
                keys: keys.to_vec(),
            })),
        };
        self.call(op, Some(name), request).await
    }
}

impl Transport for RpcTransport {
    fn kind(&self) -> &'static str {
        "rpc"
    }

    async fn create(&self, name: &str) -> Result<()> {
        self.filter_call(Operation::Create, name, &[], Call::Create).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let request = RpcRequest {
            call: Some(Call::List(ListRequest {})),
        };
        let response = self.call(Operation::List, None, request).await?;
        Ok(response.filters)
    }

    async fn add(&self, name: &str, keys: &[String]) -> Result<()> {
        self.filter_call(Operation::Add, name, keys, Call::Add).await?;
        Ok(())
    }

    async fn has(&self, name: &str, keys: &[String]) -> Result<Vec<bool>> {
        let response = self.filter_call(Operation::Has, name, keys, Call::Has).await?;
        Ok(response.results)
    }

    async fn drop_filter(&self, name: &str) -> Result<()> {
        self.filter_call(Operation::Drop, name, &[], Call::Drop).await?;
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<()> {
        self.filter_call(Operation::Clear, name, &[], Call::Clear).await?;
        Ok(())
    }

    async fn close(&self, name: &str) -> Result<()> {
        self.filter_call(Operation::Close, name, &[], Call::Close).await?;
        Ok(())
    }

    async fn info(&self, name: &str) -> Result<FilterInfo> {
        let response = self.filter_call(Operation::Info, name, &[], Call::Info).await?;
        Ok(response.info)
    }
}
