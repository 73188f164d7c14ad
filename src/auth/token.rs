use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ServerConfig;
use crate::error::{Result, TokenError, VetClinicError};

/// Claims carried by a token, keyed by claim name
pub type ClaimSet = Map<String, Value>;

/// Name of the expiration claim, seconds since the Unix epoch
pub const EXPIRATION_CLAIM: &str = "exp";

/// The only signature scheme the codec accepts
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies HS256-signed, expiring claim sets for one secret
pub struct TokenCodec {
    keys: Option<SigningKeys>,
    validation: Validation,
}

impl TokenCodec {
    /// Creates a codec for a secret. A missing or empty secret yields a codec
    /// that refuses to issue and rejects every token.
    pub fn new(secret: Option<&str>) -> Self {
        let keys = secret.filter(|s| !s.is_empty()).map(|s| SigningKeys {
            encoding: EncodingKey::from_secret(s.as_bytes()),
            decoding: DecodingKey::from_secret(s.as_bytes()),
        });

        // Expiry is checked in verify_at against an explicit clock
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&[EXPIRATION_CLAIM]);
        validation.leeway = 0;

        Self { keys, validation }
    }

    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    /// Signs `claims` with `exp` set to now + `lifetime_hours`
    pub fn issue(&self, claims: &ClaimSet, lifetime_hours: u64) -> Result<String> {
        self.issue_at(claims, lifetime_hours, Utc::now().timestamp())
    }

    /// Signs `claims` with `exp` computed from the given issue instant
    pub fn issue_at(&self, claims: &ClaimSet, lifetime_hours: u64, now: i64) -> Result<String> {
        let keys = self.keys.as_ref().ok_or_else(|| {
            VetClinicError::SigningError("no signing secret configured".to_string())
        })?;

        let exp = i64::try_from(lifetime_hours)
            .ok()
            .and_then(|hours| hours.checked_mul(3600))
            .and_then(|secs| now.checked_add(secs))
            .ok_or_else(|| {
                VetClinicError::SigningError(format!(
                    "token lifetime of {} hours is out of range",
                    lifetime_hours
                ))
            })?;

        let mut claims = claims.clone();
        claims.insert(EXPIRATION_CLAIM.to_string(), Value::from(exp));

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &keys.encoding)
            .map_err(|e| VetClinicError::SigningError(e.to_string()))
    }

    /// Verifies signature, algorithm and expiry against the current time
    pub fn verify(&self, token: &str) -> std::result::Result<ClaimSet, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verifies a token as of `now`. A token is still valid at its `exp` instant
    /// and expired one second later.
    pub fn verify_at(&self, token: &str, now: i64) -> std::result::Result<ClaimSet, TokenError> {
        let keys = match &self.keys {
            Some(keys) => keys,
            None => {
                log::warn!("Token rejected: no verification secret configured");
                return Err(TokenError::InvalidSignature);
            }
        };

        let data = decode::<ClaimSet>(token, &keys.decoding, &self.validation)
            .map_err(|e| classify(e.kind()))?;

        let exp = data
            .claims
            .get(EXPIRATION_CLAIM)
            .and_then(Value::as_i64)
            .ok_or(TokenError::MalformedToken)?;

        if now > exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

// A header naming any algorithm other than HS256 is a signature failure, never a pass
fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::MalformedToken,
    }
}

/// Access and refresh token pair returned at login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The two token kinds: distinct secrets, distinct lifetimes
pub struct AuthTokens {
    access: Arc<TokenCodec>,
    refresh: Arc<TokenCodec>,
    access_lifetime_hours: u64,
    refresh_lifetime_hours: u64,
}

impl AuthTokens {
    pub fn new(
        access_secret: Option<&str>,
        refresh_secret: Option<&str>,
        access_lifetime_hours: u64,
        refresh_lifetime_hours: u64,
    ) -> Self {
        Self {
            access: Arc::new(TokenCodec::new(access_secret)),
            refresh: Arc::new(TokenCodec::new(refresh_secret)),
            access_lifetime_hours,
            refresh_lifetime_hours,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.jwt_secret.as_deref(),
            config.jwt_refresh_secret.as_deref(),
            config.access_token_hours,
            config.refresh_token_hours,
        )
    }

    /// Shared handle, also held by the auth gate filter
    pub fn access(&self) -> &Arc<TokenCodec> {
        &self.access
    }

    pub fn refresh(&self) -> &Arc<TokenCodec> {
        &self.refresh
    }

    pub fn issue_access(&self, claims: &ClaimSet) -> Result<String> {
        self.access.issue(claims, self.access_lifetime_hours)
    }

    pub fn issue_pair(&self, claims: &ClaimSet) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access(claims)?,
            refresh_token: self.refresh.issue(claims, self.refresh_lifetime_hours)?,
        })
    }
}
