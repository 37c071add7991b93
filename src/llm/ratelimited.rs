use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::{Instrument, debug_span, info_span};

use super::{AnalysisRequest, Complete, LlmError};

/// Spaces out completions to stay under the provider's request quota
#[derive(Clone)]
pub struct RateLimitedClient<C: Complete> {
    client: C,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl<C: Complete> RateLimitedClient<C> {
    pub fn new(client: C, limiter: DefaultDirectRateLimiter) -> Self {
        Self {
            client,
            limiter: Arc::new(limiter),
        }
    }

    /// Allow at most `requests_per_minute` calls, with no burst beyond that
    pub fn per_minute(client: C, requests_per_minute: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self::new(client, RateLimiter::direct(Quota::per_minute(rpm)))
    }

    pub fn inner(&self) -> &C {
        &self.client
    }
}

impl<C: Complete> Complete for RateLimitedClient<C> {
    async fn complete(&self, request: AnalysisRequest) -> Result<String, LlmError> {
        self.limiter
            .until_ready()
            .instrument(debug_span!("limiter"))
            .await;
        self.client
            .complete(request)
            .instrument(info_span!("completion"))
            .await
    }
}
