use crate::request::{Body, HttpRequest, Method};
use anyhow::{Context, anyhow};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Turns a non-2xx response into an error carrying the body for the logs.
    pub fn ensure_success(self, what: &str) -> anyhow::Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(anyhow!(
            "{what} failed: status={} body={}",
            self.status,
            String::from_utf8_lossy(&self.body)
        ))
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
// Bounds each transcript poll; a stalled request must not stall the retry loop.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn header_map(headers: &[(String, String)]) -> anyhow::Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (k, v) in headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .with_context(|| format!("invalid header name: {k}"))?;
        let value =
            HeaderValue::from_str(v).with_context(|| format!("invalid header value for {k}"))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Sends `req` and buffers the whole response. Non-2xx statuses are not errors here;
/// see [`HttpResponse::ensure_success`].
pub async fn execute(req: &HttpRequest) -> anyhow::Result<HttpResponse> {
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("build http client")?;

    let method = match req.method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
    };
    let mut builder = client
        .request(method, &req.url)
        .headers(header_map(&req.headers)?);
    if let Body::Json(json) = &req.body {
        builder = builder.body(json.clone());
    }

    log::debug!("http {} {}", req.method, req.url);
    let resp = builder
        .send()
        .await
        .with_context(|| format!("{} {} failed", req.method, req.url))?;
    let status = resp.status().as_u16();
    let body = resp
        .bytes()
        .await
        .context("failed reading response body")?
        .to_vec();

    log::debug!("http {} {} -> {status}", req.method, req.url);
    Ok(HttpResponse { status, body })
}
