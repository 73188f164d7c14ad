use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::auth::token::{ClaimSet, EXPIRATION_CLAIM};
use crate::error::{TokenError, VetClinicError};

pub const EMAIL_CLAIM: &str = "email";
pub const ROLE_CLAIM: &str = "role";

/// Account roles. `Admin` is the privileged role for record mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = VetClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(VetClinicError::ValidationError(format!(
                "user_role must be \"user\" or \"admin\", got \"{}\"",
                other
            ))),
        }
    }
}

/// Identity carried inside a signed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Subject identifier (the account email)
    pub email: String,
    /// Present only when the deployment has roles enabled
    pub role: Option<Role>,
    /// Expiration instant, seconds since the Unix epoch
    pub expires_at: i64,
}

impl Identity {
    /// Builds the claims minted at login and refresh
    pub fn claims(email: &str, role: Option<Role>) -> ClaimSet {
        let mut claims = ClaimSet::new();
        claims.insert(EMAIL_CLAIM.to_string(), Value::from(email));
        if let Some(role) = role {
            claims.insert(ROLE_CLAIM.to_string(), Value::from(role.as_str()));
        }
        claims
    }

    /// Reads an identity back out of verified claims. An unknown role string
    /// is treated as no role at all.
    pub fn from_claims(claims: &ClaimSet) -> Result<Self, TokenError> {
        let email = claims
            .get(EMAIL_CLAIM)
            .and_then(Value::as_str)
            .filter(|email| !email.is_empty())
            .ok_or(TokenError::MalformedToken)?;

        let expires_at = claims
            .get(EXPIRATION_CLAIM)
            .and_then(Value::as_i64)
            .ok_or(TokenError::MalformedToken)?;

        let role = claims
            .get(ROLE_CLAIM)
            .and_then(Value::as_str)
            .and_then(|role| role.parse().ok());

        Ok(Self {
            email: email.to_string(),
            role,
            expires_at,
        })
    }
}
