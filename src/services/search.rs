//! Global search across upstream services and local tenant data.
//!
//! Every searchable upstream is queried concurrently at
//! `{base}/search?q=&limit=` with the gateway identity headers. A failing
//! upstream is reported under `errors` and never fails the whole search.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use axum::http::header::{ACCEPT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderMap;

use super::proxy::{forward_headers, ForwardContext, ProxyService};
use crate::config::UpstreamConfig;
use crate::db::{self, DbPool};
use crate::error::{Error, Result};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;

/// Result keys for matches served from the tenant database.
pub const LOCAL_LEAVE_KEY: &str = "leave";
pub const LOCAL_USERS_KEY: &str = "users";

/// Aggregated search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: BTreeMap<String, Vec<Value>>,
    pub errors: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct SearchService {
    proxy: ProxyService,
}

impl SearchService {
    pub fn new(proxy: ProxyService) -> Self {
        Self { proxy }
    }

    pub async fn search(
        &self,
        pool: &DbPool,
        query: &str,
        limit: Option<i64>,
        inbound: &HeaderMap,
        ctx: &ForwardContext,
    ) -> Result<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Validation("Search query must not be empty".into()));
        }
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let searchable: Vec<&UpstreamConfig> = self.proxy.upstreams().filter(|u| u.searchable).collect();
        let headers = search_headers(inbound, ctx);
        let remote = join_all(
            searchable
                .iter()
                .map(|upstream| self.search_upstream(upstream, query, limit, &headers)),
        );
        let (remote, leave_types, users) = tokio::join!(
            remote,
            db::search_leave_types(pool, query, limit),
            db::search_employees(pool, query, limit),
        );

        let mut results = BTreeMap::new();
        let mut errors = BTreeMap::new();

        for (upstream, outcome) in searchable.iter().zip(remote) {
            match outcome {
                Ok(items) => {
                    results.insert(upstream.name.clone(), items);
                }
                Err(message) => {
                    warn!(service = %upstream.name, error = %message, "Search upstream failed");
                    errors.insert(upstream.name.clone(), message);
                }
            }
        }

        results.insert(LOCAL_LEAVE_KEY.to_string(), to_values(leave_types?)?);
        results.insert(LOCAL_USERS_KEY.to_string(), to_values(users?)?);

        debug!(
            tenant = %ctx.tenant.slug,
            query = %query,
            services = results.len(),
            failed = errors.len(),
            "Search completed"
        );

        Ok(SearchResponse {
            query: query.to_string(),
            results,
            errors,
        })
    }

    async fn search_upstream(
        &self,
        upstream: &UpstreamConfig,
        query: &str,
        limit: i64,
        headers: &HeaderMap,
    ) -> std::result::Result<Vec<Value>, String> {
        let mut url = super::proxy::target_url(&upstream.base_url, "search", None);
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string());

        let request = self
            .proxy
            .client()
            .get(url)
            .headers(headers.clone())
            .timeout(self.proxy.timeout())
            .send();

        let resp = request.await.map_err(|e| {
            if e.is_timeout() {
                "timed out".to_string()
            } else {
                format!("unavailable: {}", e)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("invalid response: {}", e))?;
        Ok(extract_items(body))
    }
}

/// Accept either a bare array or an object with a `results` array.
fn extract_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(map)],
        },
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn to_values<T: Serialize>(items: Vec<T>) -> Result<Vec<Value>> {
    items
        .into_iter()
        .map(|item| serde_json::to_value(item).map_err(Error::from))
        .collect()
}

/// Headers for an upstream search call: the proxy's forwarding set, minus
/// anything describing the inbound body or its encoding.
fn search_headers(inbound: &HeaderMap, ctx: &ForwardContext) -> HeaderMap {
    let mut headers = forward_headers(inbound, ctx);
    for name in [ACCEPT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE] {
        headers.remove(name);
    }
    headers
}
