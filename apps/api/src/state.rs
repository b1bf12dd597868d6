//! Application state shared across handlers.

use std::sync::Arc;

use libreria_db::Database;

use crate::auth::JwtManager;
use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::recommendations::RecommendationClient;

/// Application state shared across all handlers.
///
/// Cloning is cheap: everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    db: Database,
    jwt: JwtManager,
    recommender: RecommendationClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the recommendation HTTP client cannot be built.
    pub fn new(config: ApiConfig, db: Database) -> ApiResult<Self> {
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_lifetime_secs);
        let recommender =
            RecommendationClient::new(&config.recommendation_url, config.recommendation_timeout())?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                jwt,
                recommender,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    #[must_use]
    pub fn jwt(&self) -> &JwtManager {
        &self.inner.jwt
    }

    #[must_use]
    pub fn recommender(&self) -> &RecommendationClient {
        &self.inner.recommender
    }
}
