//! Shared application state.

use bookon_db::Database;

use crate::auth::JwtManager;
use crate::cache::UnreadCache;
use crate::config::ApiConfig;

/// Shared application state, held as `Arc<AppState>` by the router.
pub struct AppState {
    pub db: Database,
    /// `None` when Redis is not configured or was unreachable at startup.
    pub cache: Option<UnreadCache>,
    pub config: ApiConfig,
    pub jwt: JwtManager,
}

impl AppState {
    pub fn new(db: Database, cache: Option<UnreadCache>, config: ApiConfig) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone());
        AppState {
            db,
            cache,
            config,
            jwt,
        }
    }
}
