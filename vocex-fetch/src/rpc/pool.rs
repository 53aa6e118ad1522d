//! Fixed-size pool of persistent websocket connections to the node RPC service.
//!
//! Each request/response cycle claims one connection exclusively. Claims scan round-robin
//! from the last connection handed out so load spreads over the whole pool rather than
//! clustering at the first entry.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::protocol::{frame::Utf8Bytes, Message, WebSocketConfig},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::rpc::error::TransportError;

/// Websocket stream type held by every pooled connection.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Maximum websocket message size accepted from the node (21 MiB).
pub const MAX_MESSAGE_SIZE: usize = 22_020_096;

#[derive(Debug)]
struct PoolConnection {
    in_use: AtomicBool,
    stream: Mutex<Option<WsStream>>,
}

#[derive(Debug)]
struct PoolInner {
    url: Url,
    dial_timeout: Duration,
    connections: Vec<PoolConnection>,
    last_index: AtomicUsize,
    closed: AtomicBool,
}

/// Shared handle to a fixed set of node connections.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Dials `size` connections to `url` concurrently.
    ///
    /// Fails if any connection cannot be established within `dial_timeout`.
    pub async fn connect(
        url: Url,
        size: usize,
        dial_timeout: Duration,
    ) -> Result<Self, TransportError> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::new(format!(
                "node url must use ws:// or wss://, got {url}"
            )));
        }
        if size == 0 {
            return Err(TransportError::new("connection pool size must be at least 1"));
        }

        info!("Connecting to {} with {} connections", url, size);
        let streams =
            futures::future::try_join_all((0..size).map(|_| dial(&url, dial_timeout))).await?;

        let connections = streams
            .into_iter()
            .map(|stream| PoolConnection {
                in_use: AtomicBool::new(false),
                stream: Mutex::new(Some(stream)),
            })
            .collect();

        Ok(Self {
            inner: Arc::new(PoolInner {
                url,
                dial_timeout,
                connections,
                last_index: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the node url the pool is connected to.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns the number of connections held by the pool.
    pub fn size(&self) -> usize {
        self.inner.connections.len()
    }

    /// Claims a free connection, waiting for as long as it takes.
    ///
    /// The claim is released when the returned guard is dropped.
    pub async fn acquire(&self) -> PooledConnection<'_> {
        let connections = &self.inner.connections;
        loop {
            let start = self.inner.last_index.load(Ordering::Relaxed);
            for offset in 0..connections.len() {
                let index = (start + offset) % connections.len();
                let conn = &connections[index];
                // Cheap check first, only contend on connections that look free.
                if !conn.in_use.load(Ordering::Relaxed)
                    && conn
                        .in_use
                        .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                        .is_ok()
                {
                    self.inner.last_index.store(index, Ordering::Relaxed);
                    return PooledConnection { pool: self, index };
                }
            }
            tokio::task::yield_now().await;
        }
    }

    /// Claims every connection and closes it.
    ///
    /// Connections held by in-flight calls are closed once those calls finish with the
    /// socket. The pool hands out no connection afterwards.
    pub async fn close_all(&self) {
        self.inner.closed.store(true, Ordering::Release);
        for conn in self.inner.connections.iter() {
            conn.in_use.store(true, Ordering::Release);
        }
        for conn in self.inner.connections.iter() {
            if let Some(mut stream) = conn.stream.lock().await.take() {
                if let Err(e) = stream.close(None).await {
                    debug!("Error closing node connection: {e}");
                }
            }
        }
        info!("Closed {} websocket connections", self.size());
    }

    /// Returns true once [`ConnectionPool::close_all`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns how many connections are currently claimed.
    pub fn claimed(&self) -> usize {
        self.inner
            .connections
            .iter()
            .filter(|conn| conn.in_use.load(Ordering::Acquire))
            .count()
    }
}

/// Exclusive claim on one pooled connection.
#[derive(Debug)]
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    index: usize,
}

impl PooledConnection<'_> {
    /// Position of the claimed connection inside the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    fn connection(&self) -> &PoolConnection {
        &self.pool.inner.connections[self.index]
    }

    /// Writes `payload` as a text frame and blocks until the next text frame arrives.
    ///
    /// Non-text frames are skipped. A close frame is reported as a closed connection.
    pub async fn send_receive(&self, payload: &str) -> Result<String, TransportError> {
        let mut guard = self.connection().stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;

        stream.send(Message::Text(Utf8Bytes::from(payload))).await?;
        while let Some(msg) = stream.next().await {
            match msg? {
                Message::Text(text) => return Ok(text.as_str().to_owned()),
                Message::Close(_) => return Err(TransportError::ConnectionClosed),
                _ => {}
            }
        }

        Err(TransportError::ConnectionClosed)
    }

    /// Drops the current socket and dials a fresh one in its place.
    ///
    /// On failure the slot is left empty and later calls on it fail fast until a restart
    /// succeeds.
    pub async fn restart(&self) -> Result<(), TransportError> {
        let mut guard = self.connection().stream.lock().await;
        if let Some(mut old) = guard.take() {
            if let Err(e) = old.close(None).await {
                debug!("Error closing node connection {}: {e}", self.index);
            }
        }
        if self.pool.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        match dial(&self.pool.inner.url, self.pool.inner.dial_timeout).await {
            Ok(stream) => {
                *guard = Some(stream);
                debug!("Restarted node connection {}", self.index);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to restart node connection {}: {e}", self.index);
                Err(e)
            }
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if !self.pool.is_closed() {
            self.connection().in_use.store(false, Ordering::Release);
        }
    }
}

async fn dial(url: &Url, dial_timeout: Duration) -> Result<WsStream, TransportError> {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_MESSAGE_SIZE);
    config.max_frame_size = Some(MAX_MESSAGE_SIZE);

    let (stream, _response) = tokio::time::timeout(
        dial_timeout,
        connect_async_with_config(url.as_str(), Some(config), false),
    )
    .await
    .map_err(|_| TransportError::DialTimeout(dial_timeout.as_secs()))??;

    Ok(stream)
}
