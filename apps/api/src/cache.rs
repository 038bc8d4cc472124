//! Redis cache for admin inbox unread counts.
//!
//! The cache is advisory: every Redis failure is logged at `warn` and the
//! caller falls back to PostgreSQL.
//!
//! Key format: `bookon:notifications:unread:{business_account_id | all}`

use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info, warn};

/// Seconds a cached count stays valid.
const UNREAD_TTL_SECS: u64 = 60;

const KEY_PREFIX: &str = "bookon:notifications:unread";

#[derive(Clone)]
pub struct UnreadCache {
    conn: ConnectionManager,
}

impl UnreadCache {
    /// Connects to Redis.
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis for unread counts");
        Ok(UnreadCache { conn })
    }

    pub async fn get(&self, scope: Option<&str>) -> Option<i64> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<i64>>(unread_key(scope)).await {
            Ok(value) => {
                if value.is_some() {
                    debug!(scope = ?scope, "Unread count cache hit");
                }
                value
            }
            Err(e) => {
                warn!(error = %e, "Unread count cache read failed");
                None
            }
        }
    }

    pub async fn put(&self, scope: Option<&str>, count: i64) {
        let mut conn = self.conn.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(unread_key(scope), count, UNREAD_TTL_SECS)
            .await
        {
            warn!(error = %e, "Unread count cache write failed");
        }
    }

    /// Drops the tenant's count and the all-tenants count.
    pub async fn invalidate(&self, business_account_id: &str) {
        let mut conn = self.conn.clone();
        let keys = [unread_key(Some(business_account_id)), unread_key(None)];
        if let Err(e) = conn.del::<_, ()>(&keys[..]).await {
            warn!(error = %e, business_account_id = %business_account_id, "Unread count cache invalidation failed");
        }
    }

    pub async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

fn unread_key(scope: Option<&str>) -> String {
    format!("{}:{}", KEY_PREFIX, scope.unwrap_or("all"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread_key() {
        assert_eq!(unread_key(Some("biz-1")), "bookon:notifications:unread:biz-1");
        assert_eq!(unread_key(None), "bookon:notifications:unread:all");
    }
}
