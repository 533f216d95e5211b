//! JSON/HTTP Transport
//!
//! Uses hyper with tokio for HTTP/1.1, with rustls for `https` servers.
//! Every request carries `Content-Type: application/json`; a call succeeds
//! only when the server answers `200 OK`.
//!
//! The JSON API has no endpoints for drop, clear, close or info. Those calls
//! fail locally with [`BloomgError::Unsupported`] and never touch the network.

use super::{FilterInfo, Transport};
use crate::config::ClientConfig;
use crate::error::{BloomgError, Operation, Result};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HOST, USER_AGENT};
use hyper::{Method, Request, StatusCode, Uri};
use rustls::ClientConfig as TlsConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Body of `/create`
#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    filtername: &'a str,
}

/// Body of `/add` and `/has`
#[derive(Debug, Serialize)]
struct KeysBody<'a> {
    filtername: &'a str,
    keys: &'a [String],
}

/// Envelope of every JSON reply that carries a payload
#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

/// Raw HTTP reply
struct Reply {
    status: StatusCode,
    body: Bytes,
}

/// Why `send` produced no reply
enum SendError {
    /// Connect, TLS or protocol failure
    Io(String),
    /// Reply body ran past `max_body_size`
    TooLarge,
}

impl From<String> for SendError {
    fn from(reason: String) -> Self {
        SendError::Io(reason)
    }
}

/// Host for socket and TLS use. `Uri::host` keeps the brackets of an IPv6
/// literal, which only belong in the URL and the `Host` header.
fn socket_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// JSON-over-HTTP transport
pub struct HttpTransport {
    /// Base URL without trailing slash
    server: String,
    /// Per-call deadline
    timeout: Duration,
    /// User-Agent string
    user_agent: String,
    /// Maximum response body size
    max_body_size: usize,
    /// Shared TLS settings for `https` servers
    tls: Arc<TlsConfig>,
}

impl HttpTransport {
    /// Create a transport for a base URL such as `http://localhost:8080`
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        let server = server.into().trim_end_matches('/').to_string();

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls = TlsConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        info!("HTTP transport initialized ({}, timeout: {:?})", server, timeout);

        Self {
            server,
            timeout,
            user_agent: format!("bloomg-rs/{}", env!("CARGO_PKG_VERSION")),
            max_body_size: 10 * 1024 * 1024, // 10 MB
            tls: Arc::new(tls),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut transport = Self::new(config.server.clone(), config.timeout());
        transport.user_agent = config.user_agent.clone();
        transport.max_body_size = config.max_body_size;
        // Fail early on a URL hyper cannot use
        transport.uri(Operation::List, None, "/list")?;
        Ok(transport)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn uri(&self, op: Operation, filter: Option<&str>, path: &str) -> Result<Uri> {
        format!("{}{}", self.server, path)
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| BloomgError::Transport {
                op,
                filter: filter.map(str::to_string),
                reason: format!("invalid url: {}", e),
            })
    }

    /// Perform one request under the call deadline
    async fn request(
        &self,
        op: Operation,
        filter: Option<&str>,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Reply> {
        let uri = self.uri(op, filter, path)?;
        let start = Instant::now();

        let reply = match tokio::time::timeout(self.timeout, self.send(&uri, method.clone(), body)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(SendError::TooLarge)) => {
                warn!("HTTP {} {} reply exceeds {} bytes", method, uri, self.max_body_size);
                return Err(BloomgError::Malformed {
                    op,
                    filter: filter.map(str::to_string),
                    reason: format!("body exceeds limit of {} bytes", self.max_body_size),
                });
            }
            Ok(Err(SendError::Io(reason))) => {
                warn!("HTTP {} {} failed: {}", method, uri, reason);
                return Err(BloomgError::Transport {
                    op,
                    filter: filter.map(str::to_string),
                    reason,
                });
            }
            Err(_) => {
                warn!("HTTP {} {} timed out after {:?}", method, uri, self.timeout);
                return Err(BloomgError::Timeout {
                    op,
                    filter: filter.map(str::to_string),
                    after: self.timeout,
                });
            }
        };

        debug!(
            "HTTP {} {} -> {} ({} bytes, {:?})",
            method, uri, reply.status, reply.body.len(), start.elapsed()
        );

        if reply.status != StatusCode::OK {
            return Err(BloomgError::Status {
                op,
                filter: filter.map(str::to_string),
                status: i64::from(reply.status.as_u16()),
                message: reply.status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        Ok(reply)
    }

    /// Connect, send and collect the reply, reading at most `max_body_size`
    /// bytes of body. The caller attaches the operation to errors.
    async fn send(&self, uri: &Uri, method: Method, body: Option<Vec<u8>>) -> std::result::Result<Reply, SendError> {
        let host = uri.host().ok_or_else(|| "no host in url".to_string())?;
        let is_https = uri.scheme_str() == Some("https");
        let port = uri.port_u16().unwrap_or(if is_https { 443 } else { 80 });
        let host_header = match uri.port_u16() {
            Some(p) => format!("{}:{}", host, p),
            None => host.to_string(),
        };

        let request = Request::builder()
            .method(method)
            .uri(uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"))
            .header(HOST, host_header)
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| e.to_string())?;

        let stream = tokio::net::TcpStream::connect((socket_host(host), port))
            .await
            .map_err(|e| format!("connection failed: {}", e))?;

        let response = if is_https {
            let connector = TlsConnector::from(self.tls.clone());
            let server_name = rustls::pki_types::ServerName::try_from(socket_host(host).to_string())
                .map_err(|_| "invalid server name".to_string())?;
            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| format!("tls error: {}", e))?;

            let io = hyper_util::rt::TokioIo::new(tls_stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| e.to_string())?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!("Connection closed: {}", e);
                }
            });
            sender.send_request(request).await
        } else {
            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| e.to_string())?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!("Connection closed: {}", e);
                }
            });
            sender.send_request(request).await
        };

        let response = response.map_err(|e| e.to_string())?;
        let status = response.status();
        let body = Limited::new(response.into_body(), self.max_body_size)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    SendError::TooLarge
                } else {
                    SendError::Io(format!("body read error: {}", e))
                }
            })?
            .to_bytes();

        Ok(Reply { status, body })
    }

    async fn post_json<B: Serialize>(&self, op: Operation, filter: &str, path: &str, body: &B) -> Result<Reply> {
        let payload = serde_json::to_vec(body).map_err(|e| BloomgError::Transport {
            op,
            filter: Some(filter.to_string()),
            reason: format!("encode error: {}", e),
        })?;
        self.request(op, Some(filter), Method::POST, path, Some(payload)).await
    }

    fn decode<T: DeserializeOwned>(op: Operation, filter: Option<&str>, reply: &Reply) -> Result<T> {
        serde_json::from_slice::<DataResponse<T>>(&reply.body)
            .map(|r| r.data)
            .map_err(|e| BloomgError::Malformed {
                op,
                filter: filter.map(str::to_string),
                reason: e.to_string(),
            })
    }

    fn unsupported(op: Operation) -> BloomgError {
        BloomgError::Unsupported { op, transport: "http" }
    }
}

impl Transport for HttpTransport {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn create(&self, name: &str) -> Result<()> {
        self.post_json(Operation::Create, name, "/create", &CreateBody { filtername: name })
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let reply = self.request(Operation::List, None, Method::GET, "/list", None).await?;
        Self::decode(Operation::List, None, &reply)
    }

    async fn add(&self, name: &str, keys: &[String]) -> Result<()> {
        let body = KeysBody { filtername: name, keys };
        self.post_json(Operation::Add, name, "/add", &body).await?;
        Ok(())
    }

    async fn has(&self, name: &str, keys: &[String]) -> Result<Vec<bool>> {
        let body = KeysBody { filtername: name, keys };
        let reply = self.post_json(Operation::Has, name, "/has", &body).await?;
        Self::decode(Operation::Has, Some(name), &reply)
    }

    async fn drop_filter(&self, _name: &str) -> Result<()> {
        Err(Self::unsupported(Operation::Drop))
    }

    async fn clear(&self, _name: &str) -> Result<()> {
        Err(Self::unsupported(Operation::Clear))
    }

    async fn close(&self, _name: &str) -> Result<()> {
        Err(Self::unsupported(Operation::Close))
    }

    async fn info(&self, _name: &str) -> Result<FilterInfo> {
        Err(Self::unsupported(Operation::Info))
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! In-process JSON server used by transport and client tests.

    use http_body_util::{BodyExt, Full};
    use hyper::body::{Bytes, Incoming};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Method, Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use serde_json::{json, Value};
    use std::collections::{BTreeMap, BTreeSet};
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Filters = Arc<Mutex<BTreeMap<String, BTreeSet<String>>>>;

    /// Seen `(path, content-type)` pairs
    pub type Seen = Arc<Mutex<Vec<(String, String)>>>;

    /// Filter named "bad" rejects writes with 500; "garbled" answers `/has` with junk.
    pub async fn spawn() -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        serve(listener)
    }

    /// Same server on `[::1]`, or `None` where the host has no IPv6 loopback
    pub async fn spawn_ipv6() -> Option<(String, Seen)> {
        let listener = TcpListener::bind("[::1]:0").await.ok()?;
        Some(serve(listener))
    }

    fn serve(listener: TcpListener) -> (String, Seen) {
        let base = format!("http://{}", listener.local_addr().unwrap());
        let filters: Filters = Arc::default();
        let seen: Seen = Arc::default();

        let seen_server = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                let filters = filters.clone();
                let seen = seen_server.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(req, filters.clone(), seen.clone()));
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        (base, seen)
    }

    async fn handle(
        req: Request<Incoming>,
        filters: Filters,
        seen: Seen,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();
        let content_type = req
            .headers()
            .get(hyper::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        seen.lock().unwrap().push((path.clone(), content_type));

        let body = req.into_body().collect().await.unwrap().to_bytes();
        let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let name = payload["filtername"].as_str().unwrap_or("").to_string();
        let keys: Vec<String> = payload["keys"]
            .as_array()
            .map(|a| a.iter().filter_map(|k| k.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let (status, reply) = match (method, path.as_str()) {
            (Method::POST, "/create") => {
                filters.lock().unwrap().entry(name).or_default();
                (StatusCode::OK, json!({}))
            }
            (Method::GET, "/list") => {
                let names: Vec<String> = filters.lock().unwrap().keys().cloned().collect();
                (StatusCode::OK, json!({ "data": names }))
            }
            (Method::POST, "/add") if name == "bad" => (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
            (Method::POST, "/add") => {
                filters.lock().unwrap().entry(name).or_default().extend(keys);
                (StatusCode::OK, json!({}))
            }
            (Method::POST, "/has") if name == "garbled" => (StatusCode::OK, json!({ "nope": 1 })),
            (Method::POST, "/has") => {
                let filters = filters.lock().unwrap();
                match filters.get(&name) {
                    Some(set) => {
                        let data: Vec<bool> = keys.iter().map(|k| set.contains(k)).collect();
                        (StatusCode::OK, json!({ "data": data }))
                    }
                    None => (StatusCode::NOT_FOUND, json!({})),
                }
            }
            _ => (StatusCode::NOT_FOUND, json!({})),
        };

        let mut response = Response::new(Full::new(Bytes::from(reply.to_string())));
        *response.status_mut() = status;
        Ok(response)
    }
}
