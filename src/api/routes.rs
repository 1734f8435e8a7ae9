//! Admin API route handlers
//!
//! Thin adapters: parse the request, resolve services from the container,
//! call into the core, translate errors. No business logic lives here.

use http::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::app::CommerceApp;
use crate::datastore::Record;
use crate::modules::auth::{AuthModuleService, AuthenticationInput};
use crate::modules::order::OrderModuleService;
use crate::modules::product::ProductModuleService;
use crate::query::input::QueryVariables;

/// `GET /admin/products/{id}/variants`
///
/// Lists a product's variants through the remote query composer, echoing
/// pagination metadata the way admin list endpoints do.
pub async fn list_product_variants(
    app: &Arc<CommerceApp>,
    product_id: &str,
    query_params: &HashMap<String, String>,
) -> Result<(StatusCode, Value), ApiError> {
    let fields: Vec<String> = query_params
        .get("fields")
        .map(|f| f.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_else(|| vec!["*".to_string()]);

    let mut filters = Record::new();
    filters.insert("product_id".to_string(), json!(product_id));

    let variables = QueryVariables {
        filters,
        order: Vec::new(),
        skip: parse_number(query_params, "offset")?,
        take: parse_number(query_params, "limit")?,
    };

    let result = app
        .query_with_variables(
            crate::query::input::QueryInput::Object(json!({
                "entry_point": "variant",
                "fields": fields,
            })),
            variables,
        )
        .await?;

    Ok((
        StatusCode::OK,
        json!({
            "variants": result.rows,
            "count": result.metadata.count,
            "offset": result.metadata.skip,
            "limit": result.metadata.take,
        }),
    ))
}

/// `POST /admin/products/{id}/variants`
///
/// Creates a variant for the product via the product module's command
/// surface and returns it.
pub async fn create_product_variant(
    app: &Arc<CommerceApp>,
    product_id: &str,
    body: Value,
) -> Result<(StatusCode, Value), ApiError> {
    let service = app
        .container()
        .resolve("product_module")
        .ok_or_else(|| ApiError::service_unavailable("product module is not available"))?;
    let products = service
        .as_any()
        .downcast_ref::<ProductModuleService>()
        .ok_or_else(|| ApiError::service_unavailable("product module is not available"))?;

    let mut variant = match body {
        Value::Object(map) => map,
        Value::Null => Record::new(),
        _ => return Err(ApiError::bad_request("request body must be an object")),
    };
    variant.insert("product_id".to_string(), json!(product_id));

    let created = products.create_variants(vec![variant])?;
    Ok((StatusCode::OK, json!({ "variant": created[0] })))
}

/// `GET|POST /auth/{scope}/{provider}`
///
/// Delegates to the auth module service; an authentication failure is an
/// unauthorized response, never retried.
pub async fn authenticate(
    app: &Arc<CommerceApp>,
    scope: &str,
    provider: &str,
    headers: HashMap<String, String>,
    body: Value,
) -> Result<(StatusCode, Value), ApiError> {
    let service = app
        .container()
        .resolve("auth_module")
        .ok_or_else(|| ApiError::service_unavailable("auth module is not available"))?;
    let auth = service
        .as_any()
        .downcast_ref::<AuthModuleService>()
        .ok_or_else(|| ApiError::service_unavailable("auth module is not available"))?;

    let identity = auth
        .authenticate(
            provider,
            AuthenticationInput {
                scope: scope.to_string(),
                headers,
                body,
            },
        )
        .await?;

    Ok((StatusCode::OK, json!({ "auth_identity": identity })))
}

/// `POST /admin/orders/{id}/edits`
///
/// Begins an order edit. Concurrent begin requests for the same order are
/// serialized per key; an already-active edit is a conflict.
pub async fn begin_order_edit(
    app: &Arc<CommerceApp>,
    order_id: &str,
    body: Value,
) -> Result<(StatusCode, Value), ApiError> {
    let service = app
        .container()
        .resolve("order_module")
        .ok_or_else(|| ApiError::service_unavailable("order module is not available"))?;
    let orders = service
        .as_any()
        .downcast_ref::<OrderModuleService>()
        .ok_or_else(|| ApiError::service_unavailable("order module is not available"))?;

    let created_by = body
        .get("created_by")
        .and_then(Value::as_str)
        .unwrap_or("admin")
        .to_string();

    let edit = orders.begin_edit(order_id, &created_by).await?;
    Ok((StatusCode::OK, json!({ "order_edit": edit })))
}

fn parse_number(
    params: &HashMap<String, String>,
    key: &str,
) -> Result<Option<u64>, ApiError> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("invalid {key}: {raw}"))),
    }
}
