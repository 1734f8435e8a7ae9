//! Admin API server
//!
//! HTTP/1.1 boundary over the application core. Connections are served on
//! spawned tasks; handlers resolve services from the container per request
//! and translate core errors into status codes.

pub mod error;
pub mod routes;

use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::api::error::ApiError;
use crate::app::CommerceApp;

/// Admin API server.
pub struct ApiServer {
    app: Arc<CommerceApp>,
    addr: SocketAddr,
}

impl ApiServer {
    pub fn new(app: Arc<CommerceApp>, addr: SocketAddr) -> Self {
        Self { app, addr }
    }

    /// Bind and serve until the task is dropped.
    pub async fn serve(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_with_listener(listener).await
    }

    /// Serve on an already-bound listener (tests bind port 0 themselves).
    pub async fn serve_with_listener(&self, listener: TcpListener) -> anyhow::Result<()> {
        info!(
            "Admin API listening on {}",
            listener.local_addr().unwrap_or(self.addr)
        );

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept API connection: {}", e);
                    continue;
                }
            };
            debug!("New API connection from {}", peer);

            let app = Arc::clone(&self.app);
            tokio::spawn(async move {
                let service = service_fn(move |request| {
                    let app = Arc::clone(&app);
                    async move { handle(app, request).await }
                });
                if let Err(e) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!("API connection from {} ended: {}", peer, e);
                }
            });
        }
    }
}

/// Route one request. Never returns an error: failures become responses.
async fn handle(
    app: Arc<CommerceApp>,
    request: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query_params = parse_query(request.uri().query());
    let headers = collect_headers(&request);

    let body = match read_json_body(request).await {
        Ok(body) => body,
        Err(e) => return Ok(error_response(e)),
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let result = match (&method, segments.as_slice()) {
        (&Method::GET, ["admin", "products", product_id, "variants"]) => {
            routes::list_product_variants(&app, product_id, &query_params).await
        }
        (&Method::POST, ["admin", "products", product_id, "variants"]) => {
            routes::create_product_variant(&app, product_id, body).await
        }
        (&Method::POST, ["admin", "orders", order_id, "edits"]) => {
            routes::begin_order_edit(&app, order_id, body).await
        }
        (&Method::GET, ["auth", scope, provider]) | (&Method::POST, ["auth", scope, provider]) => {
            routes::authenticate(&app, scope, provider, headers, body).await
        }
        _ => Err(ApiError::not_found(format!("no route for {method} {path}"))),
    };

    Ok(match result {
        Ok((status, value)) => json_response(status, &value),
        Err(e) => error_response(e),
    })
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn collect_headers(request: &Request<Incoming>) -> HashMap<String, String> {
    request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

async fn read_json_body(request: Request<Incoming>) -> Result<Value, ApiError> {
    let bytes = request
        .into_body()
        .collect()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read body: {e}")))?
        .to_bytes();
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
}

fn json_response(status: StatusCode, value: &Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(value.to_string())))
        .expect("static response construction")
}

fn error_response(e: ApiError) -> Response<Full<Bytes>> {
    Response::builder()
        .status(e.status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(e.body())))
        .expect("static response construction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_pairs() {
        let params = parse_query(Some("limit=10&offset=20&fields=id,sku"));
        assert_eq!(params.get("limit").map(String::as_str), Some("10"));
        assert_eq!(params.get("offset").map(String::as_str), Some("20"));
        assert_eq!(params.get("fields").map(String::as_str), Some("id,sku"));
    }

    #[test]
    fn empty_query_is_empty_map() {
        assert!(parse_query(None).is_empty());
    }
}
