//! Client code for swcache.
//!
//! This crate provides the HTTP fetch client and the cache controller
//! (worker) that decides, per request, whether to answer from the network,
//! the versioned cache, or the offline fallback page.

pub mod fetch;
pub mod worker;

pub use reqwest::{Method, StatusCode, Url, header};

pub use fetch::{FetchClient, FetchConfig, Network, resolve, same_origin};
pub use worker::{
    ExtendableEvent, FetchEvent, FetchOutcome, Registration, Request, RequestClass, RequestMode, Response,
    ResponseSource, UpdateReport, Worker, WorkerOptions, WorkerState,
};
