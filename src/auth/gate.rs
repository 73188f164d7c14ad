//! Request-level authentication and role gates
//!
//! The auth gate turns an `Authorization` header into a [`RequestContext`];
//! the role gate checks that context against a required role. Both are plain
//! functions wrapped into warp filters, so the role gate can only run on a
//! context the auth gate already produced.

use std::sync::Arc;

use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::{Filter, Rejection};

use crate::auth::token::TokenCodec;
use crate::auth::user::{Identity, Role};
use crate::error::{Result, VetClinicError};

/// Identity of the caller, scoped to a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub email: String,
    /// Only populated when roles are enabled
    pub role: Option<Role>,
}

/// Strips an optional `Bearer ` prefix. A bare token is accepted as is.
pub fn extract_bearer_token(auth_header: &str) -> &str {
    let trimmed = auth_header.trim();
    trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))
        .map(str::trim_start)
        .unwrap_or(trimmed)
}

/// Verifies the access token in `auth_header` and builds the request context
pub fn authenticate(
    auth_header: Option<&str>,
    access: &TokenCodec,
    roles_enabled: bool,
) -> Result<RequestContext> {
    let header = auth_header.unwrap_or_default();
    if header.trim().is_empty() {
        log::debug!("Request rejected: missing Authorization header");
        return Err(VetClinicError::Unauthenticated("missing token".to_string()));
    }

    let token = extract_bearer_token(header);
    if token.is_empty() {
        return Err(VetClinicError::Unauthenticated("missing token".to_string()));
    }

    let identity = access
        .verify(token)
        .and_then(|claims| Identity::from_claims(&claims))
        .map_err(|e| {
            log::warn!("Request rejected: access token {}", e.as_str());
            VetClinicError::from(e)
        })?;

    Ok(RequestContext {
        request_id: Uuid::new_v4(),
        email: identity.email,
        role: if roles_enabled { identity.role } else { None },
    })
}

/// Exact-match role check against a context the auth gate produced
pub fn require_role(ctx: &RequestContext, required: Role) -> Result<()> {
    match ctx.role {
        Some(role) if role == required => Ok(()),
        _ => {
            log::warn!(
                "Request {} rejected: {} lacks role {}",
                ctx.request_id,
                ctx.email,
                required
            );
            Err(VetClinicError::Forbidden(format!(
                "insufficient privileges, {} role required",
                required
            )))
        }
    }
}

/// Warp filter running the auth gate on every request it guards
pub fn with_auth(
    access: Arc<TokenCodec>,
    roles_enabled: bool,
) -> BoxedFilter<(RequestContext,)> {
    warp::header::optional::<String>("authorization")
        .and_then(move |header: Option<String>| {
            let access = access.clone();
            async move {
                authenticate(header.as_deref(), &access, roles_enabled)
                    .map_err(warp::reject::custom)
            }
        })
        .boxed()
}

/// Chains the role gate after `auth`. With roles disabled the role gate is
/// not wired in at all and `auth` is returned unchanged.
pub fn with_role(
    auth: BoxedFilter<(RequestContext,)>,
    required: Role,
    roles_enabled: bool,
) -> BoxedFilter<(RequestContext,)> {
    if !roles_enabled {
        return auth;
    }

    auth.and_then(move |ctx: RequestContext| async move {
        require_role(&ctx, required).map_err(warp::reject::custom)?;
        Ok::<_, Rejection>(ctx)
    })
    .boxed()
}
