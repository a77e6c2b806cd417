mod limit;
mod pricing;
mod semantic;
mod wom;

pub use limit::RateLimiter;
pub use pricing::PricingApi;
pub use semantic::SemanticApi;
pub use wom::{WomClient, WomGroupMember, WomPlayer};

use miette::Diagnostic;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UpstreamError {
    #[error("error building upstream request")]
    RequestBuild(#[source] reqwest::Error),

    #[error("error executing upstream request")]
    RequestExecute(#[source] reqwest::Error),

    #[error("upstream reported a server error")]
    Status(#[source] reqwest::Error),

    #[error("error extracting upstream response body")]
    Body(#[source] reqwest::Error),

    #[error("error deserializing upstream response")]
    Deserialize(#[source] serde_json::Error),

    #[error("upstream call exceeded its {0:?} budget")]
    Timeout(Duration),
}

/// Bundles the wiki-backed clients behind one reqwest client and one shared
/// rate limit window, the way submissions consume them.
#[derive(Clone)]
pub struct OsrsApiClient {
    pub semantic: SemanticApi,
    pub pricing: PricingApi,
}

impl OsrsApiClient {
    pub fn new() -> Self {
        let client = reqwest::Client::new();
        let limiter = Arc::new(RateLimiter::by_convention());
        Self {
            semantic: SemanticApi::new(client.clone(), limiter.clone()),
            pricing: PricingApi::new(client, limiter),
        }
    }
}

impl Default for OsrsApiClient {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    limiter: &RateLimiter,
    budget: Duration,
    request: reqwest::RequestBuilder,
) -> Result<T, UpstreamError> {
    limiter.acquire().await;

    let request = request.build().map_err(UpstreamError::RequestBuild)?;

    let response = tokio::time::timeout(budget, client.execute(request))
        .await
        .map_err(|_| UpstreamError::Timeout(budget))?
        .map_err(UpstreamError::RequestExecute)?
        .error_for_status()
        .map_err(UpstreamError::Status)?;

    let body = tokio::time::timeout(budget, response.text())
        .await
        .map_err(|_| UpstreamError::Timeout(budget))?
        .map_err(UpstreamError::Body)?;

    serde_json::from_str(&body).map_err(UpstreamError::Deserialize)
}
