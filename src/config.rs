//! Server configuration module
//! Loads process configuration once at startup; every value is read-only afterwards.

use crate::constants::{
    DEFAULT_ACCESS_TOKEN_HOURS, DEFAULT_DATABASE_URL, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_REFRESH_TOKEN_HOURS, DEFAULT_STORE_TIMEOUT_MS, MEMORY_DATABASE_URL, MIN_SECRET_LENGTH,
};
use crate::error::{Result, VetClinicError};
use std::env;
use std::time::Duration;

/// Credentials for the administrator account created at startup
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// SQLite URL of the record store, or `memory` for a throwaway store
    pub database_url: String,
    /// Secret signing access tokens. `None` makes every token fail closed.
    pub jwt_secret: Option<String>,
    /// Secret signing refresh tokens, must differ from the access secret
    pub jwt_refresh_secret: Option<String>,
    /// Wires the role gate into mutating routes
    pub roles_enabled: bool,
    pub access_token_hours: u64,
    pub refresh_token_hours: u64,
    /// Deadline attached to every repository call
    pub store_timeout: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ServerConfig {
    /// Create a test configuration - DANGEROUS: Only for testing!
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: MEMORY_DATABASE_URL.to_string(),
            jwt_secret: Some("test-access-key-only-for-unit-tests-0123456789".to_string()),
            jwt_refresh_secret: Some(
                "test-refresh-key-only-for-unit-tests-9876543210".to_string(),
            ),
            roles_enabled: true,
            access_token_hours: DEFAULT_ACCESS_TOKEN_HOURS,
            refresh_token_hours: DEFAULT_REFRESH_TOKEN_HOURS,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            bootstrap_admin: None,
        }
    }

    /// Validate that a secret meets length and complexity requirements
    fn validate_secret(secret: &str, secret_type: &str) -> Result<()> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(VetClinicError::ConfigError(format!(
                "{} secret must be at least {} characters long",
                secret_type, MIN_SECRET_LENGTH
            )));
        }

        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(VetClinicError::ConfigError(format!(
                "{} secret should contain mixed characters (letters, numbers, symbols)",
                secret_type
            )));
        }

        Ok(())
    }

    /// Access and refresh tokens must not share a signing secret
    fn validate_secrets_are_different(access: &str, refresh: &str) -> Result<()> {
        if access == refresh {
            return Err(VetClinicError::ConfigError(
                "JWT_SECRET and JWT_REFRESH_SECRET must be different".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| -> Result<Option<u64>> {
            match non_empty(key) {
                Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                    VetClinicError::ConfigError(format!("{} must be a whole number", key))
                }),
                None => Ok(None),
            }
        };
        let flag = |key: &str, default: bool| {
            non_empty(key)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(default)
        };

        let host = non_empty("VET_CLINIC_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match non_empty("VET_CLINIC_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                VetClinicError::ConfigError(format!("VET_CLINIC_PORT is not a valid port: {}", raw))
            })?,
            None => DEFAULT_PORT,
        };

        let database_url = non_empty("VET_CLINIC_DATABASE_URL")
            .or_else(|| non_empty("DATABASE_URL"))
            .map(|url| url.trim().to_string())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let jwt_secret = non_empty("VET_CLINIC_JWT_SECRET").or_else(|| non_empty("JWT_SECRET"));
        let jwt_refresh_secret = non_empty("VET_CLINIC_JWT_REFRESH_SECRET")
            .or_else(|| non_empty("JWT_REFRESH_SECRET"));

        match &jwt_secret {
            Some(secret) => Self::validate_secret(secret, "JWT")?,
            None => log::warn!("JWT_SECRET is not set: every access token will be rejected"),
        }
        match &jwt_refresh_secret {
            Some(secret) => Self::validate_secret(secret, "JWT refresh")?,
            None => {
                log::warn!("JWT_REFRESH_SECRET is not set: every refresh token will be rejected")
            }
        }
        if let (Some(access), Some(refresh)) = (&jwt_secret, &jwt_refresh_secret) {
            Self::validate_secrets_are_different(access, refresh)?;
        }

        let access_token_hours =
            parsed("VET_CLINIC_ACCESS_TOKEN_HOURS")?.unwrap_or(DEFAULT_ACCESS_TOKEN_HOURS);
        let refresh_token_hours =
            parsed("VET_CLINIC_REFRESH_TOKEN_HOURS")?.unwrap_or(DEFAULT_REFRESH_TOKEN_HOURS);
        let store_timeout_ms =
            parsed("VET_CLINIC_STORE_TIMEOUT_MS")?.unwrap_or(DEFAULT_STORE_TIMEOUT_MS);

        let bootstrap_admin = match (
            non_empty("VET_CLINIC_ADMIN_EMAIL"),
            non_empty("VET_CLINIC_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => {
                return Err(VetClinicError::ConfigError(
                    "VET_CLINIC_ADMIN_EMAIL and VET_CLINIC_ADMIN_PASSWORD must be set together"
                        .to_string(),
                ))
            }
        };

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            jwt_refresh_secret,
            roles_enabled: flag("VET_CLINIC_ROLES_ENABLED", true),
            access_token_hours,
            refresh_token_hours,
            store_timeout: Duration::from_millis(store_timeout_ms),
            bootstrap_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.jwt_secret.is_none());
        assert!(config.jwt_refresh_secret.is_none());
        assert!(config.roles_enabled);
        assert_eq!(config.access_token_hours, 2);
        assert_eq!(config.refresh_token_hours, 168);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn test_database_url_is_read() {
        let config = ServerConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            " sqlite:///var/lib/vet/clinic.db ",
        )]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite:///var/lib/vet/clinic.db");

        let config = ServerConfig::from_lookup(lookup_from(&[
            ("VET_CLINIC_DATABASE_URL", "memory"),
            ("DATABASE_URL", "sqlite://ignored.db"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, MEMORY_DATABASE_URL);
    }

    #[test]
    fn test_for_testing_works_in_tests() {
        let config = ServerConfig::for_testing();
        assert!(config.jwt_secret.is_some());
        assert_ne!(config.jwt_secret, config.jwt_refresh_secret);
    }

    #[test]
    fn test_prefixed_secret_wins() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("VET_CLINIC_JWT_SECRET", "prefixed_access_key_with_32_chars_0001"),
            ("JWT_SECRET", "plain_access_key_with_32_characters_0002"),
        ]))
        .unwrap();
        assert_eq!(
            config.jwt_secret.as_deref(),
            Some("prefixed_access_key_with_32_chars_0001")
        );
    }

    #[test]
    fn test_roles_flag_can_be_disabled() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("VET_CLINIC_ROLES_ENABLED", "false")]))
                .unwrap();
        assert!(!config.roles_enabled);
    }

    #[test]
    fn test_half_configured_admin_is_rejected() {
        let result =
            ServerConfig::from_lookup(lookup_from(&[("VET_CLINIC_ADMIN_EMAIL", "a@b.com")]));
        assert!(matches!(result, Err(VetClinicError::ConfigError(_))));
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let result = ServerConfig::from_lookup(lookup_from(&[("VET_CLINIC_PORT", "eighty")]));
        assert!(result.is_err());
    }
}
