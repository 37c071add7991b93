//! # Mock Fetcher for Testing
//!
//! Provides a `MockFetcher` that implements [`Fetch`] by looking up canned
//! outcomes by URL, and records every URL it was asked for so tests can assert
//! which cascade tiers ran.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Fetch, FetchOutcome, FetchRequest, FetchResponse};

/// A mock fetcher returning predefined outcomes keyed by exact URL.
/// Unknown URLs resolve to a network error.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, FetchOutcome>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outcome for a URL
    pub fn respond(&self, url: &str, outcome: FetchOutcome) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), outcome);
        self
    }

    /// Register a 200 response with the given body
    pub fn respond_ok(&self, url: &str, body: &str) -> &Self {
        self.respond(
            url,
            FetchOutcome::Success(FetchResponse {
                status: 200,
                body: body.to_string(),
                final_url: url.to_string(),
            }),
        )
    }

    /// URLs requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of times a URL was requested
    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

impl Fetch for MockFetcher {
    async fn fetch(&self, request: FetchRequest) -> FetchOutcome {
        self.calls.lock().unwrap().push(request.url.clone());
        self.responses
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| FetchOutcome::NetworkError(format!("no mock for {}", request.url)))
    }
}
