//! Client for the external recommendation service.
//!
//! The service takes the product ids already in a cart and answers with ids
//! of products customers tend to buy alongside them:
//!
//! ```text
//! POST {RECOMMENDATION_SERVICE_URL}
//! {"input": ["p-1", "p-2"]}          ──►   {"suggested": ["p-7", "p-3"]}
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
struct RecommendationRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RecommendationResponse {
    #[serde(default)]
    suggested: Vec<String>,
}

/// HTTP client for the recommendation service.
#[derive(Clone)]
pub struct RecommendationClient {
    client: reqwest::Client,
    url: String,
}

impl RecommendationClient {
    /// Create a new client with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(url: &str, timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Asks the service which product ids go with `product_ids`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Unavailable`] when the service is unreachable or times out
    /// - [`ApiError::Upstream`] on a non-2xx status or an unreadable body
    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    pub async fn suggest(&self, product_ids: &[String]) -> ApiResult<Vec<String>> {
        let response = self
            .client
            .post(&self.url)
            .json(&RecommendationRequest { input: product_ids })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, url = %self.url, "Recommendation service unreachable");
                ApiError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("status {status}: {body}")));
        }

        let body: RecommendationResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Unavailable(e.to_string())
            } else {
                ApiError::Upstream(format!("invalid response: {e}"))
            }
        })?;

        tracing::debug!(suggested = body.suggested.len(), "Recommendations received");
        Ok(body.suggested)
    }
}
