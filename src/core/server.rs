//! Shared server state assembled once at startup

use std::future::Future;
use std::io;
use std::sync::Arc;

use crate::auth::AuthTokens;
use crate::config::ServerConfig;
use crate::core::accounts::AccountService;
use crate::core::clinic::ClinicService;
use crate::error::Result;
use crate::storage::Repositories;

/// Services and settings handed to every route
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<AuthTokens>,
    pub clinic: Arc<ClinicService>,
    pub accounts: Arc<AccountService>,
    pub roles_enabled: bool,
}

impl AppState {
    /// Builds the services on top of injected repositories
    pub fn new(config: &ServerConfig, repositories: Repositories) -> Self {
        let tokens = Arc::new(AuthTokens::from_config(config));
        let accounts = Arc::new(AccountService::new(
            repositories.users.clone(),
            tokens.clone(),
            config.roles_enabled,
            config.store_timeout,
        ));
        let clinic = Arc::new(ClinicService::new(repositories, config.store_timeout));

        if !config.roles_enabled {
            log::warn!("Roles are disabled: every authenticated caller may write");
        }

        Self {
            tokens,
            clinic,
            accounts,
            roles_enabled: config.roles_enabled,
        }
    }

    /// Creates the bootstrap administrator when one is configured
    pub async fn bootstrap(&self, config: &ServerConfig) -> Result<()> {
        if let Some(admin) = &config.bootstrap_admin {
            self.accounts.ensure_admin(admin).await?;
        }
        Ok(())
    }
}

/// Completes when `signal` fires. A listener that failed to register never
/// completes, so the server keeps serving instead of stopping right after bind.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => log::info!("Shutdown signal received"),
        Err(e) => {
            log::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_follows_the_signal() {
        let fired = async { Ok::<(), io::Error>(()) };
        let done = tokio::time::timeout(Duration::from_millis(100), shutdown_on(fired));
        assert!(done.await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_signal_listener_keeps_serving() {
        let failed = async { Err::<(), _>(io::Error::other("no signal handler")) };
        let done = tokio::time::timeout(Duration::from_millis(100), shutdown_on(failed));
        assert!(done.await.is_err());
    }
}
