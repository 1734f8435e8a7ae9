//! External module proxy
//!
//! A thin JSON-over-TCP proxy implementing `ModuleService` for modules hosted
//! outside the process. The wire protocol is newline-delimited JSON request /
//! response pairs with correlation ids; each call opens its own connection
//! and is bounded by the declaration's timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;
use uuid::Uuid;

use crate::config::ExternalServerConfig;
use crate::link::config::ModuleJoinerConfig;
use crate::module::traits::{FetchRequest, FetchResult, ModuleError, ModuleService};

/// Wire request envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Wire response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub id: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Proxy to a remotely hosted module service.
pub struct ExternalModuleProxy {
    service_name: String,
    address: String,
    timeout: Duration,
    joiner_config: ModuleJoinerConfig,
}

impl ExternalModuleProxy {
    /// Connect to the remote module and fetch its joiner config.
    ///
    /// A failure here is a module load failure: the remote end is the only
    /// source of truth for the service's entity shapes and aliases.
    pub async fn connect(
        module_name: &str,
        server: &ExternalServerConfig,
    ) -> Result<Self, ModuleError> {
        let timeout = Duration::from_secs(server.timeout_secs);
        let config_value = request(
            &server.address,
            timeout,
            "joiner_config",
            Value::Null,
        )
        .await?;

        let joiner_config: ModuleJoinerConfig = serde_json::from_value(config_value)
            .map_err(|e| ModuleError::Load(format!("Invalid remote joiner config: {e}")))?;

        debug!(
            "Connected external module {} at {} (service {})",
            module_name, server.address, joiner_config.service_name
        );

        Ok(Self {
            service_name: joiner_config.service_name.clone(),
            address: server.address.clone(),
            timeout,
            joiner_config,
        })
    }
}

#[async_trait]
impl ModuleService for ExternalModuleProxy {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn joiner_config(&self) -> ModuleJoinerConfig {
        self.joiner_config.clone()
    }

    async fn fetch(&self, req: FetchRequest) -> Result<FetchResult, ModuleError> {
        let params = serde_json::to_value(&req)?;
        let result = request(&self.address, self.timeout, "fetch", params).await?;
        let fetched: FetchResult = serde_json::from_value(result)
            .map_err(|e| ModuleError::Remote(format!("Invalid fetch response: {e}")))?;
        Ok(fetched)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Perform one request/response round trip against the remote service.
async fn request(
    address: &str,
    timeout: Duration,
    method: &str,
    params: Value,
) -> Result<Value, ModuleError> {
    let envelope = RemoteRequest {
        id: Uuid::new_v4().to_string(),
        method: method.to_string(),
        params,
    };

    let exchange = async {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| ModuleError::Load(format!("Connect to {address} failed: {e}")))?;
        let (read_half, mut write_half) = stream.into_split();

        let mut payload = serde_json::to_vec(&envelope)?;
        payload.push(b'\n');
        write_half
            .write_all(&payload)
            .await
            .map_err(|e| ModuleError::Remote(format!("Write failed: {e}")))?;

        let mut line = String::new();
        BufReader::new(read_half)
            .read_line(&mut line)
            .await
            .map_err(|e| ModuleError::Remote(format!("Read failed: {e}")))?;

        let response: RemoteResponse = serde_json::from_str(line.trim_end())
            .map_err(|e| ModuleError::Remote(format!("Invalid response frame: {e}")))?;

        if response.id != envelope.id {
            return Err(ModuleError::Remote(format!(
                "Correlation mismatch: sent {}, got {}",
                envelope.id, response.id
            )));
        }
        if let Some(error) = response.error {
            return Err(ModuleError::Remote(error));
        }
        response
            .result
            .ok_or_else(|| ModuleError::Remote("Response carried no result".to_string()))
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ModuleError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::config::{EntityShape, JoinerAlias};
    use serde_json::json;
    use tokio::net::TcpListener;

    fn remote_config() -> ModuleJoinerConfig {
        ModuleJoinerConfig {
            service_name: "pricing".to_string(),
            is_link: false,
            primary_keys: vec!["id".to_string()],
            alias: vec![JoinerAlias::new("price"), JoinerAlias::new("prices")],
            entities: vec![EntityShape::new("price", &["id", "amount", "currency"])],
            relationships: vec![],
            extends: vec![],
        }
    }

    /// Minimal remote module: answers joiner_config and a canned fetch.
    async fn spawn_remote() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.into_split();
                    let mut line = String::new();
                    if BufReader::new(read_half).read_line(&mut line).await.is_err() {
                        return;
                    }
                    let request: RemoteRequest = serde_json::from_str(line.trim_end()).unwrap();
                    let response = match request.method.as_str() {
                        "joiner_config" => RemoteResponse {
                            id: request.id,
                            result: Some(serde_json::to_value(remote_config()).unwrap()),
                            error: None,
                        },
                        "fetch" => RemoteResponse {
                            id: request.id,
                            result: Some(json!({
                                "rows": [{"id": "price_1", "amount": 1900, "currency": "usd"}],
                                "count": 1
                            })),
                            error: None,
                        },
                        other => RemoteResponse {
                            id: request.id,
                            result: None,
                            error: Some(format!("unknown method: {other}")),
                        },
                    };
                    let mut payload = serde_json::to_vec(&response).unwrap();
                    payload.push(b'\n');
                    let _ = write_half.write_all(&payload).await;
                });
            }
        });

        address
    }

    #[tokio::test]
    async fn connect_fetches_remote_joiner_config() {
        let address = spawn_remote().await;
        let proxy = ExternalModuleProxy::connect(
            "pricing",
            &ExternalServerConfig {
                address,
                timeout_secs: 5,
            },
        )
        .await
        .unwrap();

        assert_eq!(proxy.service_name(), "pricing");
        assert_eq!(proxy.joiner_config().alias.len(), 2);
    }

    #[tokio::test]
    async fn fetch_round_trips_rows() {
        let address = spawn_remote().await;
        let proxy = ExternalModuleProxy::connect(
            "pricing",
            &ExternalServerConfig {
                address,
                timeout_secs: 5,
            },
        )
        .await
        .unwrap();

        let result = proxy
            .fetch(FetchRequest::all("price", Default::default()))
            .await
            .unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.rows[0]["id"], json!("price_1"));
    }

    #[tokio::test]
    async fn connect_to_dead_address_is_a_load_error() {
        let result = ExternalModuleProxy::connect(
            "pricing",
            &ExternalServerConfig {
                address: "127.0.0.1:1".to_string(),
                timeout_secs: 1,
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(ModuleError::Load(_)) | Err(ModuleError::Timeout)
        ));
    }
}
