//! Request classification: picks exactly one strategy per request.

use reqwest::Method;
use swcache_core::PolicyKind;

use super::WorkerOptions;
use super::request::{Request, RequestMode};
use crate::fetch::same_origin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Another origin; left to the default network path.
    CrossOrigin,
    /// Same origin but not a GET; never intercepted.
    NonGet,
    /// Document load, network-first.
    Navigation,
    /// Path under the data prefix, stale-while-revalidate.
    Data,
    /// Any other same-origin GET, cache-first.
    Static,
}

pub fn classify(request: &Request, options: &WorkerOptions) -> RequestClass {
    if !same_origin(&request.url, &options.origin) {
        return RequestClass::CrossOrigin;
    }
    if request.method != Method::GET {
        return RequestClass::NonGet;
    }

    match options.policy {
        PolicyKind::MultiStrategyNavigation if request.mode == RequestMode::Navigate => RequestClass::Navigation,
        PolicyKind::MultiStrategyNavigation => RequestClass::Static,
        PolicyKind::JsonRevalidate if request.url.path().starts_with(&options.data_prefix) => RequestClass::Data,
        PolicyKind::JsonRevalidate => RequestClass::Static,
    }
}
