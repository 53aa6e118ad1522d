//! Gateway client over http(s) or a single persistent websocket.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, ClientBuilder};
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{frame::Utf8Bytes, Message},
};
use tracing::{debug, info, warn};
use url::Url;

use vocex_common::GatewayConfig;

use crate::{
    gateway::{
        error::GatewayError,
        types::{MetaRequest, MetaResponse, ProcessResults, RequestMessage, ResponseMessage},
    },
    rpc::pool::WsStream,
};

#[derive(Debug, Clone)]
enum Transport {
    Http(Client),
    Ws(Arc<Mutex<Option<WsStream>>>),
}

/// Application gateway client.
#[derive(Debug, Clone)]
pub struct GatewayConnector {
    url: Url,
    transport: Transport,
    request_timeout: Duration,
    id_counter: Arc<AtomicU64>,
}

impl GatewayConnector {
    /// Connects to the gateway described by `config`.
    ///
    /// Websocket endpoints are dialled immediately; http endpoints only build a client.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let request_timeout = Duration::from_secs(config.request_timeout);
        let transport = match config.url.scheme() {
            "http" | "https" => Transport::Http(
                ClientBuilder::new()
                    .timeout(request_timeout)
                    .pool_max_idle_per_host(10)
                    .pool_idle_timeout(Duration::from_secs(10))
                    .build()?,
            ),
            "ws" | "wss" => {
                info!("Connecting to gateway: {}", config.url);
                let stream = dial(&config.url, request_timeout).await?;
                Transport::Ws(Arc::new(Mutex::new(Some(stream))))
            }
            other => return Err(GatewayError::UnsupportedScheme(other.to_string())),
        };

        Ok(Self {
            url: config.url.clone(),
            transport,
            request_timeout,
            id_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Returns the gateway url.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Closes the websocket, if any.
    pub async fn close(&self) {
        if let Transport::Ws(slot) = &self.transport {
            if let Some(mut stream) = slot.lock().await.take() {
                if let Err(e) = stream.close(None).await {
                    debug!("Error closing gateway connection: {e}");
                }
            }
        }
    }

    /// Sends `request` and returns the validated response body.
    pub async fn request(&self, mut request: MetaRequest) -> Result<MetaResponse, GatewayError> {
        let method = request.method.clone();
        request.timestamp = chrono::Utc::now().timestamp();
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst).to_string();
        let body = serde_json::to_string(&RequestMessage {
            id: id.clone(),
            request,
            signature: String::new(),
        })?;

        let envelope = self.exchange(&body, &id, &method).await?;
        if envelope.signature.is_empty() {
            return Err(GatewayError::EmptySignature { method });
        }
        if !envelope.response.ok {
            return Err(GatewayError::NotOk {
                method,
                message: envelope.response.message,
            });
        }
        Ok(envelope.response)
    }

    /// Sends `body` and reads the reply carrying `id`, within the request timeout.
    ///
    /// The websocket is taken out of its slot for the exchange and only put back after a
    /// matching reply, so an exchange that does not complete never leaves a stale reply
    /// queued for the next request.
    async fn exchange(
        &self,
        body: &str,
        id: &str,
        method: &str,
    ) -> Result<ResponseMessage, GatewayError> {
        match &self.transport {
            Transport::Http(client) => {
                let send = async {
                    client
                        .post(self.url.clone())
                        .header("Content-Type", "application/json")
                        .body(body.to_string())
                        .send()
                        .await?
                        .text()
                        .await
                };
                let text = tokio::time::timeout(self.request_timeout, send)
                    .await
                    .map_err(|_| GatewayError::Timeout(method.to_string()))??;
                parse_envelope(&text, id, method)
            }
            Transport::Ws(slot) => {
                let mut guard = slot.lock().await;
                let mut stream = match guard.take() {
                    Some(stream) => stream,
                    None => {
                        warn!("Gateway connection lost, reconnecting to {}", self.url);
                        dial(&self.url, self.request_timeout).await?
                    }
                };
                let text =
                    tokio::time::timeout(self.request_timeout, write_read(&mut stream, body))
                        .await
                        .map_err(|_| GatewayError::Timeout(method.to_string()))??;
                let envelope = parse_envelope(&text, id, method)?;
                *guard = Some(stream);
                Ok(envelope)
            }
        }
    }

    /// Returns the number of entities known to the gateway.
    pub async fn entity_count(&self) -> Result<u64, GatewayError> {
        let response = self.request(MetaRequest::new("getEntityCount")).await?;
        response.size.ok_or(GatewayError::MissingField {
            method: "getEntityCount".to_string(),
            field: "size",
        })
    }

    /// Returns the number of processes known to the gateway.
    pub async fn process_count(&self) -> Result<u64, GatewayError> {
        let response = self.request(MetaRequest::new("getProcessCount")).await?;
        response.size.ok_or(GatewayError::MissingField {
            method: "getProcessCount".to_string(),
            field: "size",
        })
    }

    /// Returns up to `list_size` entity ids following `from_id`.
    ///
    /// An empty `from_id` starts from the first entity.
    pub async fn entity_list(
        &self,
        from_id: &str,
        list_size: u32,
    ) -> Result<Vec<String>, GatewayError> {
        let mut request = MetaRequest::new("getEntityList");
        request.from_id = from_id.to_string();
        request.list_size = list_size;
        Ok(self.request(request).await?.entity_ids)
    }

    /// Returns up to `list_size` process ids of `entity_id` following `from_id`.
    pub async fn process_list(
        &self,
        entity_id: &str,
        from_id: &str,
        list_size: u32,
    ) -> Result<Vec<String>, GatewayError> {
        let mut request = MetaRequest::new("getProcessList");
        request.entity_id = entity_id.to_string();
        request.from_id = from_id.to_string();
        request.list_size = list_size;
        Ok(self.request(request).await?.process_list)
    }

    /// Returns the current results of a voting process.
    pub async fn results(&self, process_id: &str) -> Result<ProcessResults, GatewayError> {
        let mut request = MetaRequest::new("getResults");
        request.process_id = process_id.to_string();
        let response = self.request(request).await?;
        if response.message == "no results yet" {
            return Ok(ProcessResults {
                state: response.state,
                process_type: response.process_type,
                ..Default::default()
            });
        }
        Ok(ProcessResults {
            results: response.results,
            state: response.state,
            process_type: response.process_type,
            is_final: response.is_final.unwrap_or(false),
        })
    }
}

async fn dial(url: &Url, dial_timeout: Duration) -> Result<WsStream, GatewayError> {
    let (stream, _response) = tokio::time::timeout(dial_timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| GatewayError::Timeout("connect".to_string()))??;
    Ok(stream)
}

fn parse_envelope(text: &str, id: &str, method: &str) -> Result<ResponseMessage, GatewayError> {
    let envelope: ResponseMessage = serde_json::from_str(text)?;
    if envelope.id != id {
        return Err(GatewayError::IdMismatch {
            method: method.to_string(),
        });
    }
    Ok(envelope)
}

async fn write_read(stream: &mut WsStream, body: &str) -> Result<String, GatewayError> {
    stream.send(Message::Text(Utf8Bytes::from(body))).await?;
    while let Some(msg) = stream.next().await {
        match msg? {
            Message::Text(text) => return Ok(text.as_str().to_owned()),
            Message::Close(_) => return Err(GatewayError::ConnectionClosed),
            _ => {}
        }
    }
    Err(GatewayError::ConnectionClosed)
}
