//! Reverse proxy to upstream tenant services.
//!
//! Forwards `/api/{service}/...` to the configured upstream base URL. Inbound
//! hop-by-hop and identity headers are dropped, and the gateway injects the
//! resolved tenant and user so upstreams never trust client-supplied identity.
//! Request and response bodies are streamed without buffering.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, CONNECTION, HOST};
use axum::http::{HeaderMap, Method, Request, Response};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::models::ResolvedTenant;

pub const X_TENANT_ID: &str = "x-tenant-id";
pub const X_TENANT_SLUG: &str = "x-tenant-slug";
pub const X_TENANT_DATABASE: &str = "x-tenant-database";
pub const X_USER_ID: &str = "x-user-id";
pub const X_USER_ROLE: &str = "x-user-role";
pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers scoped to a single connection.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Identity the gateway vouches for on a forwarded request.
#[derive(Debug, Clone)]
pub struct ForwardContext {
    pub tenant: ResolvedTenant,
    pub user_id: String,
    pub role: String,
    pub request_id: String,
    /// Host the client addressed.
    pub host: Option<String>,
    /// Peer address of the client, when known.
    pub client_ip: Option<String>,
}

impl ForwardContext {
    /// Headers injected on every upstream call.
    pub fn identity_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let pairs = [
            (X_TENANT_ID, self.tenant.id.as_str()),
            (X_TENANT_SLUG, self.tenant.slug.as_str()),
            (X_TENANT_DATABASE, self.tenant.database_name.as_str()),
            (X_USER_ID, self.user_id.as_str()),
            (X_USER_ROLE, self.role.as_str()),
            (X_REQUEST_ID, self.request_id.as_str()),
        ];
        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
        headers
    }
}

/// Proxy for configured upstream services.
#[derive(Clone)]
pub struct ProxyService {
    client: reqwest::Client,
    upstreams: Arc<BTreeMap<String, UpstreamConfig>>,
    timeout: Duration,
}

impl ProxyService {
    pub fn new(upstreams: BTreeMap<String, UpstreamConfig>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            upstreams: Arc::new(upstreams),
            timeout,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn upstream(&self, service: &str) -> Result<&UpstreamConfig> {
        self.upstreams
            .get(service)
            .ok_or_else(|| Error::ServiceNotFound(service.to_string()))
    }

    pub fn upstreams(&self) -> impl Iterator<Item = &UpstreamConfig> {
        self.upstreams.values()
    }

    /// Forward a request to `service`, preserving `path` and the query string.
    pub async fn forward(
        &self,
        service: &str,
        path: &str,
        req: Request<Body>,
        ctx: ForwardContext,
    ) -> Result<Response<Body>> {
        let upstream = self.upstream(service)?;
        let (parts, body) = req.into_parts();

        let url = target_url(&upstream.base_url, path, parts.uri.query());
        let headers = forward_headers(&parts.headers, &ctx);
        let method = parts.method.clone();

        debug!(
            service = %service,
            tenant = %ctx.tenant.slug,
            request_id = %ctx.request_id,
            method = %method,
            url = %url,
            "Proxying request"
        );

        let mut builder = self.client.request(method.clone(), url).headers(headers);
        if carries_body(&method, &parts.headers) {
            builder = builder.body(stream_body(body));
        }

        let resp = match tokio::time::timeout(self.timeout, builder.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(map_upstream_error(service, e)),
            Err(_) => {
                warn!(service = %service, request_id = %ctx.request_id, "Upstream timed out");
                return Err(Error::UpstreamTimeout(service.to_string()));
            }
        };

        into_response(resp)
    }
}

/// Join the upstream base URL with the forwarded path suffix.
pub fn target_url(base: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url.set_query(query.filter(|q| !q.is_empty()));
    url
}

/// Filter inbound headers and add the gateway's identity headers.
pub fn forward_headers(inbound: &HeaderMap, ctx: &ForwardContext) -> HeaderMap {
    let mut headers = strip_hop_by_hop(inbound);
    headers.remove(HOST);

    let spoofable: Vec<HeaderName> = headers
        .keys()
        .filter(|name| {
            let name = name.as_str();
            name.starts_with("x-tenant-") || name.starts_with("x-user-")
        })
        .cloned()
        .collect();
    for name in spoofable {
        headers.remove(name);
    }

    if let Some(host) = ctx.host.as_deref().and_then(|h| HeaderValue::from_str(h).ok()) {
        headers.insert(HeaderName::from_static(X_FORWARDED_HOST), host);
    }

    if !headers.contains_key(X_FORWARDED_PROTO) {
        headers.insert(HeaderName::from_static(X_FORWARDED_PROTO), HeaderValue::from_static("http"));
    }

    if let Some(ip) = &ctx.client_ip {
        let chain = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) if !prior.trim().is_empty() => format!("{}, {}", prior, ip),
            _ => ip.clone(),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(HeaderName::from_static(X_FORWARDED_FOR), value);
        }
    }

    headers.extend(ctx.identity_headers());
    headers
}

/// Copy headers, leaving out hop-by-hop ones and any named in `Connection`.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let lower = name.as_str();
        if HOP_BY_HOP.contains(&lower) || listed.iter().any(|l| l == lower) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

fn carries_body(method: &Method, headers: &HeaderMap) -> bool {
    if headers.contains_key(axum::http::header::TRANSFER_ENCODING) {
        return true;
    }
    match headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        Some(len) => len > 0,
        None => !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::DELETE),
    }
}

/// Re-stream an axum body into a reqwest body.
///
/// axum bodies are not `Sync`, so chunks are pumped through a channel.
fn stream_body(body: Body) -> reqwest::Body {
    let (tx, rx) = mpsc::channel::<std::result::Result<axum::body::Bytes, axum::Error>>(16);

    tokio::spawn(async move {
        let mut stream = body.into_data_stream();
        while let Some(chunk) = stream.next().await {
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });

    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}

fn into_response(resp: reqwest::Response) -> Result<Response<Body>> {
    let status = resp.status();
    let headers = strip_hop_by_hop(resp.headers());

    let mut response = Response::builder()
        .status(status)
        .body(Body::from_stream(resp.bytes_stream()))
        .map_err(|e| Error::Internal(format!("Failed to build proxy response: {}", e)))?;
    *response.headers_mut() = headers;

    Ok(response)
}

fn map_upstream_error(service: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        warn!(service = %service, error = %err, "Upstream timed out");
        Error::UpstreamTimeout(service.to_string())
    } else {
        warn!(service = %service, error = %err, "Upstream unavailable");
        Error::UpstreamUnavailable(service.to_string())
    }
}
