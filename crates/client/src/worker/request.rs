//! Request and response values flowing through the worker.

use std::str::FromStr;

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use swcache_core::{Error, RequestKey, StoredResponse};

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// A document load (address bar, link click, form navigation).
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

impl FromStr for RequestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "cors" => Ok(RequestMode::Cors),
            "no-cors" => Ok(RequestMode::NoCors),
            other => Err(Error::InvalidInput(format!("unsupported request mode: {other}"))),
        }
    }
}

/// Whether intermediate HTTP caches may answer the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Go to the origin server, bypassing any intermediate cache layer.
    NoStore,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub mode: RequestMode,
    pub headers: HeaderMap,
    pub cache: CacheMode,
}

impl Request {
    pub fn new(url: Url, method: Method, mode: RequestMode) -> Self {
        Self { url, method, mode, headers: HeaderMap::new(), cache: CacheMode::Default }
    }

    /// A sub-resource GET.
    pub fn get(url: Url) -> Self {
        Self::new(url, Method::GET, RequestMode::SameOrigin)
    }

    /// A document navigation, sent with a browser-like HTML `Accept` header.
    pub fn navigate(url: Url) -> Self {
        Self::new(url, Method::GET, RequestMode::Navigate)
            .with_accept("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
    }

    /// Set the `Accept` header. Values that are not valid header text are ignored.
    pub fn with_accept(mut self, accept: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(accept) {
            self.headers.insert(header::ACCEPT, value);
        }
        self
    }

    /// Copy of this request that bypasses intermediate caches.
    pub fn no_store(&self) -> Self {
        Self { cache: CacheMode::NoStore, ..self.clone() }
    }

    pub fn accept(&self) -> Option<&str> {
        self.headers.get(header::ACCEPT).and_then(|v| v.to_str().ok())
    }

    /// Whether the caller wants an HTML document back.
    pub fn accepts_html(&self) -> bool {
        self.accept().is_some_and(|accept| accept.contains("text/html"))
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), self.url.as_str())
    }
}

/// A response, either live from the network or rebuilt from the cache.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects.
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the response may be written to a cache bucket.
    ///
    /// Partial content and `Vary: *` responses are never stored.
    pub fn is_cacheable(&self) -> bool {
        if self.status == StatusCode::PARTIAL_CONTENT {
            return false;
        }
        !self
            .headers
            .get_all(header::VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.split(',').any(|field| field.trim() == "*"))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn to_stored(&self) -> StoredResponse {
        StoredResponse {
            url: self.url.clone(),
            status: self.status.as_u16(),
            headers: self
                .headers
                .iter()
                .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
                .collect(),
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl TryFrom<StoredResponse> for Response {
    type Error = Error;

    fn try_from(stored: StoredResponse) -> Result<Self, Self::Error> {
        let status = StatusCode::from_u16(stored.status)
            .map_err(|e| Error::CorruptEntry(format!("status {}: {e}", stored.status)))?;

        let mut headers = HeaderMap::with_capacity(stored.headers.len());
        for (name, value) in &stored.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CorruptEntry(format!("header name {name}: {e}")))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| Error::CorruptEntry(format!("header value: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self { url: stored.url, status, headers, body: Bytes::from(stored.body) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("https://site.example").unwrap().join(path).unwrap()
    }

    fn response(status: StatusCode, headers: &[(&'static str, &'static str)]) -> Response {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(*value));
        }
        Response { url: url("/").to_string(), status, headers: map, body: Bytes::from_static(b"body") }
    }

    #[test]
    fn test_navigate_accepts_html() {
        let request = Request::navigate(url("/about.html"));
        assert_eq!(request.mode, RequestMode::Navigate);
        assert!(request.accepts_html());
    }

    #[test]
    fn test_get_without_accept() {
        let request = Request::get(url("/assets/site.css"));
        assert!(!request.accepts_html());
        assert!(request.accept().is_none());
    }

    #[test]
    fn test_no_store_keeps_identity() {
        let request = Request::get(url("/data/projects.json")).with_accept("application/json");
        let bypass = request.no_store();
        assert_eq!(bypass.cache, CacheMode::NoStore);
        assert_eq!(bypass.key(), request.key());
        assert_eq!(bypass.accept(), Some("application/json"));
    }

    #[test]
    fn test_request_mode_from_str() {
        assert_eq!("navigate".parse::<RequestMode>().unwrap(), RequestMode::Navigate);
        assert_eq!("no-cors".parse::<RequestMode>().unwrap(), RequestMode::NoCors);
        assert!("sideways".parse::<RequestMode>().is_err());
    }

    #[test]
    fn test_cacheable() {
        assert!(response(StatusCode::OK, &[]).is_cacheable());
        assert!(response(StatusCode::NOT_FOUND, &[]).is_cacheable());
        assert!(!response(StatusCode::PARTIAL_CONTENT, &[]).is_cacheable());
        assert!(!response(StatusCode::OK, &[("vary", "Accept-Encoding, *")]).is_cacheable());
        assert!(response(StatusCode::OK, &[("vary", "Accept-Encoding")]).is_cacheable());
    }

    #[test]
    fn test_stored_conversion_keeps_headers() {
        let original =
            response(StatusCode::OK, &[("content-type", "text/css"), ("set-cookie", "a=1"), ("set-cookie", "b=2")]);
        let rebuilt = Response::try_from(original.to_stored()).unwrap();

        assert_eq!(rebuilt.status, StatusCode::OK);
        assert_eq!(rebuilt.content_type(), Some("text/css"));
        assert_eq!(rebuilt.headers.get_all("set-cookie").iter().count(), 2);
        assert_eq!(rebuilt.text(), "body");
    }

    #[test]
    fn test_corrupt_stored_status() {
        let stored = StoredResponse {
            url: "https://site.example/".into(),
            status: 42,
            headers: Vec::new(),
            body: Vec::new(),
            stored_at: String::new(),
        };
        assert!(matches!(Response::try_from(stored), Err(Error::CorruptEntry(_))));
    }
}
