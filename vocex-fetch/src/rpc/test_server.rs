//! Local websocket server used by the pool and connector tests.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};
use url::Url;

pub(crate) type Handler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Maps the server-wide reply number, starting at 0, to the delay before that reply.
pub(crate) type Delay = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

pub(crate) struct EchoServer {
    addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl EchoServer {
    pub(crate) fn url(&self) -> Url {
        Url::parse(&format!("ws://{}/websocket", self.addr)).unwrap()
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Replies to every text frame with the same text.
pub(crate) async fn spawn_echo_server() -> EchoServer {
    spawn_server(Arc::new(|text: &str| text.to_string())).await
}

/// Replies to every text frame with `handler(text)`.
pub(crate) async fn spawn_server(handler: Handler) -> EchoServer {
    spawn_delayed_server(handler, Arc::new(|_| Duration::ZERO)).await
}

/// Like [`spawn_server`], holding each reply back by `delay(reply_number)`.
pub(crate) async fn spawn_delayed_server(handler: Handler, delay: Delay) -> EchoServer {
    let replies = Arc::new(AtomicUsize::new(0));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let handler = handler.clone();
            let delay = delay.clone();
            let replies = replies.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(socket).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(text) = msg {
                        let reply = handler(text.as_str());
                        let wait = delay(replies.fetch_add(1, Ordering::SeqCst));
                        if !wait.is_zero() {
                            tokio::time::sleep(wait).await;
                        }
                        if ws.send(Message::Text(reply.into())).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });
    EchoServer { addr, task }
}
