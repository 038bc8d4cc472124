//! JWT authentication module.
//!
//! Validates `Authorization: Bearer <token>` (HS256) and exposes the caller
//! to handlers as [`AuthUser`]. Tokens are issued by the identity service;
//! [`JwtManager::issue`] exists for tooling and tests.
//!
//! ## Tenant Scope
//! ```text
//! role          business_account_id    scope()
//! ───────────   ───────────────────    ───────────────────────
//! super_admin   (ignored)              None  → every tenant
//! admin/staff   Some(biz)              Some(biz)
//! admin/staff   None                   403 FORBIDDEN
//! parent        any                    own bookings/credits only
//! ```

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Caller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Parent,
    Staff,
    Admin,
    SuperAdmin,
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,

    pub role: Role,

    /// Tenant of admin/staff users
    #[serde(default)]
    pub business_account_id: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    secret: String,
}

impl JwtManager {
    pub fn new(secret: impl Into<String>) -> Self {
        JwtManager {
            secret: secret.into(),
        }
    }

    /// Signs a token valid for `lifetime`.
    pub fn issue(
        &self,
        user_id: &str,
        role: Role,
        business_account_id: Option<&str>,
        lifetime: Duration,
    ) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            business_account_id: business_account_id.map(str::to_string),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(ApiError::internal)
    }

    /// Validate and decode a token.
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
    pub business_account_id: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SuperAdmin)
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin role required"))
        }
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if matches!(self.role, Role::Staff | Role::Admin | Role::SuperAdmin) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Staff role required"))
        }
    }

    /// Tenant filter for admin/staff queries. `None` means every tenant.
    pub fn scope(&self) -> Result<Option<&str>, ApiError> {
        match self.role {
            Role::SuperAdmin => Ok(None),
            _ => self
                .business_account_id
                .as_deref()
                .map(Some)
                .ok_or_else(|| ApiError::forbidden("No business account on token")),
        }
    }

    /// Whether the caller administers `business_account_id`.
    pub fn manages(&self, business_account_id: &str) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::Admin | Role::Staff => {
                self.business_account_id.as_deref() == Some(business_account_id)
            }
            Role::Parent => false,
        }
    }

    /// Admin of `business_account_id`, or 404 so other tenants' ids do not leak.
    pub fn require_manages(&self, business_account_id: &str) -> Result<(), ApiError> {
        self.require_admin()?;
        if self.manages(business_account_id) {
            Ok(())
        } else {
            Err(ApiError::not_found(format!(
                "Business account not found: {}",
                business_account_id
            )))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::unauthorized("Invalid authorization header"))?;

        let claims = state.jwt.validate(token)?;

        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
            business_account_id: claims.business_account_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret");
        let token = manager
            .issue("admin-1", Role::Admin, Some("biz-1"), Duration::hours(1))
            .unwrap();

        let claims = manager.validate(&token).unwrap();
        assert_eq!(claims.sub, "admin-1");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.business_account_id.as_deref(), Some("biz-1"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("one")
            .issue("u-1", Role::Parent, None, Duration::hours(1))
            .unwrap();
        assert!(JwtManager::new("two").validate(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = JwtManager::new("test-secret");
        let token = manager
            .issue("u-1", Role::Parent, None, Duration::hours(-2))
            .unwrap();
        assert!(manager.validate(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_scope() {
        let admin = AuthUser {
            user_id: "a".into(),
            role: Role::Admin,
            business_account_id: Some("biz-1".into()),
        };
        assert_eq!(admin.scope().unwrap(), Some("biz-1"));
        assert!(admin.manages("biz-1"));
        assert!(!admin.manages("biz-2"));

        let root = AuthUser {
            user_id: "r".into(),
            role: Role::SuperAdmin,
            business_account_id: None,
        };
        assert_eq!(root.scope().unwrap(), None);
        assert!(root.manages("biz-2"));

        let orphan = AuthUser {
            user_id: "s".into(),
            role: Role::Staff,
            business_account_id: None,
        };
        assert!(orphan.scope().is_err());
    }
}
