// src/api/plugin_auth.rs
//
// Authentication for `/api/plugins/*`: either a session JWT or a plugin API key
// (`rk_live_...`) in `Authorization: Bearer`. Each request is also counted
// against the per-client plugin rate limit.

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use super::auth::{bearer_token, decode_jwt};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::{client_identifier, PLUGIN_LIMIT};
use crate::signature::sha256_hex;
use crate::AppState;

pub const API_KEY_PREFIX: &str = "rk_live_";
pub const WILDCARD_SCOPE: &str = "*";

pub const KNOWN_SCOPES: &[&str] = &[
    "projects:read",
    "projects:write",
    "renders:read",
    "renders:write",
    "credits:read",
    "webhook:read",
    "webhook:write",
    WILDCARD_SCOPE,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    ApiKey { key_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct PluginAuth {
    pub user_id: Uuid,
    pub method: AuthMethod,
    pub scopes: Vec<String>,
}

impl PluginAuth {
    /// Session tokens carry every scope; API keys only what they were issued with.
    pub fn has_scope(&self, scope: &str) -> bool {
        match self.method {
            AuthMethod::Session => true,
            AuthMethod::ApiKey { .. } => self.scopes.iter().any(|s| s == scope || s == WILDCARD_SCOPE),
        }
    }

    pub fn require(&self, scope: &str) -> ApiResult<()> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("Insufficient permissions. Required scope: {scope}")))
        }
    }
}

async fn authenticate(state: web::Data<AppState>, identifier: String, token: Option<String>) -> ApiResult<PluginAuth> {
    let decision = state.rate_limiter.check(&format!("plugin:{identifier}"), PLUGIN_LIMIT);
    if !decision.allowed {
        return Err(ApiError::RateLimited {
            limit: decision.limit,
            reset_at_ms: decision.reset_at_ms,
        });
    }

    let token = token.ok_or(ApiError::Unauthorized)?;

    if token.starts_with(API_KEY_PREFIX) {
        let key = db::api_keys::find_active_by_hash(&state.pool, &sha256_hex(&token))
            .await?
            .ok_or(ApiError::Unauthorized)?;
        if let Err(e) = db::api_keys::touch_last_used(&state.pool, key.id).await {
            log::warn!("updating last_used_at for api key {} failed: {e}", key.id);
        }
        return Ok(PluginAuth {
            user_id: key.user_id,
            method: AuthMethod::ApiKey { key_id: key.id },
            scopes: key.scopes,
        });
    }

    let user_id = decode_jwt(&state.config.jwt_secret, &token).ok_or(ApiError::Unauthorized)?;
    Ok(PluginAuth {
        user_id,
        method: AuthMethod::Session,
        scopes: vec![WILDCARD_SCOPE.to_string()],
    })
}

impl FromRequest for PluginAuth {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let identifier = client_identifier(req);
        let token = bearer_token(req).map(str::to_string);

        Box::pin(async move {
            let state = state.ok_or_else(|| ApiError::Internal("application state missing".into()))?;
            authenticate(state, identifier, token).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_auth(scopes: &[&str]) -> PluginAuth {
        PluginAuth {
            user_id: Uuid::new_v4(),
            method: AuthMethod::ApiKey { key_id: Uuid::new_v4() },
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn api_keys_are_limited_to_their_scopes() {
        let auth = key_auth(&["projects:read"]);
        assert!(auth.has_scope("projects:read"));
        assert!(!auth.has_scope("renders:write"));
        assert!(auth.require("renders:write").is_err());
    }

    #[test]
    fn wildcard_and_session_grant_everything() {
        assert!(key_auth(&["*"]).has_scope("webhook:write"));

        let session = PluginAuth {
            user_id: Uuid::new_v4(),
            method: AuthMethod::Session,
            scopes: Vec::new(),
        };
        assert!(session.has_scope("credits:read"));
    }
}
