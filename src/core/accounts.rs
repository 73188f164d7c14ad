//! Account management, login and token refresh

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthTokens, CredentialVerifier, Identity, RequestContext, Role, TokenPair};
use crate::config::BootstrapAdmin;
use crate::constants::LOGIN_FAILURE_FLOOR_MS;
use crate::core::payload::{LoginRequest, RefreshTokenRequest, UserRequest};
use crate::error::{Result, VetClinicError};
use crate::security::timing::FailureFloor;
use crate::storage::{with_deadline, EntityId, NewUser, UserRecord, UserStorage, UserUpdate};

const BAD_CREDENTIALS: &str = "invalid email or password";

/// User accounts and the token endpoints built on them
pub struct AccountService {
    users: Arc<dyn UserStorage>,
    tokens: Arc<AuthTokens>,
    verifier: CredentialVerifier,
    roles_enabled: bool,
    deadline: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStorage>,
        tokens: Arc<AuthTokens>,
        roles_enabled: bool,
        deadline: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            verifier: CredentialVerifier::new(),
            roles_enabled,
            deadline,
        }
    }

    // Argon2 is CPU-bound, keep it off the async workers
    async fn hash_password(&self, password: String) -> Result<String> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| VetClinicError::HashingError(e.to_string()))?
    }

    async fn password_matches(&self, password: String, hash: String) -> Result<bool> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.verify(&password, &hash))
            .await
            .map_err(|e| VetClinicError::HashingError(e.to_string()))
    }

    fn token_role(&self, role: Option<Role>) -> Option<Role> {
        if self.roles_enabled {
            role
        } else {
            None
        }
    }

    /// Exchanges valid credentials for an access and refresh token pair
    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair> {
        let floor = FailureFloor::start(Duration::from_millis(LOGIN_FAILURE_FLOOR_MS));
        let credentials = request.validate()?;

        let user = with_deadline(
            self.deadline,
            self.users.find_user_by_email(&credentials.email),
        )
        .await?;

        let user = match user {
            Some(user) => user,
            None => {
                log::warn!("Login rejected: unknown account");
                floor.hold().await;
                return Err(VetClinicError::Unauthenticated(BAD_CREDENTIALS.to_string()));
            }
        };

        if !self
            .password_matches(credentials.password, user.password_hash.clone())
            .await?
        {
            log::warn!("Login rejected: wrong password for user {}", user.id);
            floor.hold().await;
            return Err(VetClinicError::Unauthenticated(BAD_CREDENTIALS.to_string()));
        }

        let claims = Identity::claims(&user.email, self.token_role(user.role));
        let pair = self.tokens.issue_pair(&claims)?;
        log::info!("User {} logged in", user.id);
        Ok(pair)
    }

    /// Issues a new access token with the subject and role of a valid refresh token
    pub async fn refresh(&self, request: RefreshTokenRequest) -> Result<String> {
        let token = request.validate()?;

        let identity = self
            .tokens
            .refresh()
            .verify(&token)
            .and_then(|claims| Identity::from_claims(&claims))
            .map_err(|e| {
                log::warn!("Refresh rejected: refresh token {}", e.as_str());
                VetClinicError::from(e)
            })?;

        let claims = Identity::claims(&identity.email, self.token_role(identity.role));
        self.tokens.issue_access(&claims)
    }

    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        request: UserRequest,
    ) -> Result<UserRecord> {
        let draft = request.validate_new()?;
        let password_hash = self.hash_password(draft.password).await?;

        let user = with_deadline(
            self.deadline,
            self.users.create_user(NewUser {
                email: draft.email,
                password_hash,
                role: draft.role,
            }),
        )
        .await?;
        log::info!("[{}] {} created user {}", ctx.request_id, ctx.email, user.id);
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        with_deadline(self.deadline, self.users.list_users()).await
    }

    pub async fn get_user(&self, id: EntityId) -> Result<UserRecord> {
        with_deadline(self.deadline, self.users.get_user(id)).await
    }

    /// Changes email and password; the new password is hashed again
    pub async fn update_user(
        &self,
        ctx: &RequestContext,
        id: EntityId,
        request: UserRequest,
    ) -> Result<UserRecord> {
        let draft = request.validate_update()?;
        let password_hash = self.hash_password(draft.password).await?;

        let user = with_deadline(
            self.deadline,
            self.users.update_user(
                id,
                UserUpdate {
                    email: draft.email,
                    password_hash,
                },
            ),
        )
        .await?;
        log::info!("[{}] {} updated user {}", ctx.request_id, ctx.email, id);
        Ok(user)
    }

    pub async fn delete_user(&self, ctx: &RequestContext, id: EntityId) -> Result<()> {
        with_deadline(self.deadline, self.users.delete_user(id)).await?;
        log::info!("[{}] {} deleted user {}", ctx.request_id, ctx.email, id);
        Ok(())
    }

    /// Creates the configured administrator unless the email is already taken.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> Result<bool> {
        let draft = UserRequest {
            user_email: Some(admin.email.clone()),
            user_password: Some(admin.password.clone()),
            user_role: Some(Role::Admin.to_string()),
        }
        .validate_new()?;

        if with_deadline(self.deadline, self.users.find_user_by_email(&draft.email))
            .await?
            .is_some()
        {
            log::info!("Bootstrap admin already present");
            return Ok(false);
        }

        let password_hash = self.hash_password(draft.password).await?;
        let user = with_deadline(
            self.deadline,
            self.users.create_user(NewUser {
                email: draft.email,
                password_hash,
                role: draft.role,
            }),
        )
        .await?;
        log::info!("Bootstrap admin created as user {}", user.id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error::TokenError;
    use crate::storage::MemoryStore;
    use uuid::Uuid;

    fn service(roles_enabled: bool) -> AccountService {
        let config = ServerConfig::for_testing();
        AccountService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(AuthTokens::from_config(&config)),
            roles_enabled,
            Duration::from_secs(5),
        )
    }

    fn ctx() -> RequestContext {
        RequestContext {
            request_id: Uuid::new_v4(),
            email: "admin@clinic.test".into(),
            role: Some(Role::Admin),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            user_email: Some(email.into()),
            user_password: Some(password.into()),
        }
    }

    async fn seed(accounts: &AccountService) {
        accounts
            .create_user(
                &ctx(),
                UserRequest {
                    user_email: Some("a@b.com".into()),
                    user_password: Some("secret".into()),
                    user_role: Some("user".into()),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_login_issues_both_tokens() {
        let accounts = service(true);
        seed(&accounts).await;

        let pair = accounts.login(login("a@b.com", "secret")).await.unwrap();
        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password_and_unknown_email() {
        let accounts = service(true);
        seed(&accounts).await;

        let wrong = accounts.login(login("a@b.com", "Secret")).await.unwrap_err();
        let unknown = accounts.login(login("x@b.com", "secret")).await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.reason(), "unauthenticated");
    }

    #[tokio::test]
    async fn test_refresh_keeps_subject_and_role() {
        let accounts = service(true);
        seed(&accounts).await;
        let pair = accounts.login(login("a@b.com", "secret")).await.unwrap();

        let access = accounts
            .refresh(RefreshTokenRequest {
                refresh_token: Some(pair.refresh_token),
            })
            .await
            .unwrap();
        let claims = accounts.tokens.access().verify(&access).unwrap();
        let identity = Identity::from_claims(&claims).unwrap();
        assert_eq!(identity.email, "a@b.com");
        assert_eq!(identity.role, Some(Role::User));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let accounts = service(true);
        seed(&accounts).await;
        let pair = accounts.login(login("a@b.com", "secret")).await.unwrap();

        let result = accounts
            .refresh(RefreshTokenRequest {
                refresh_token: Some(pair.access_token),
            })
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, VetClinicError::Token(TokenError::InvalidSignature)));
        assert_eq!(err.status_code(), warp::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_roles_disabled_omits_role_claim() {
        let accounts = service(false);
        seed(&accounts).await;
        let pair = accounts.login(login("a@b.com", "secret")).await.unwrap();

        let claims = accounts.tokens.access().verify(&pair.access_token).unwrap();
        assert!(!claims.contains_key("role"));
    }

    #[tokio::test]
    async fn test_stored_password_is_hashed() {
        let accounts = service(true);
        seed(&accounts).await;
        let users = accounts.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_ne!(users[0].password_hash, "secret");
        assert!(users[0].password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_ensure_admin_runs_once() {
        let accounts = service(true);
        let admin = BootstrapAdmin {
            email: "Root@Clinic.test".into(),
            password: "change-me".into(),
        };
        assert!(accounts.ensure_admin(&admin).await.unwrap());
        assert!(!accounts.ensure_admin(&admin).await.unwrap());

        let users = accounts.list_users().await.unwrap();
        assert_eq!(users[0].email, "root@clinic.test");
        assert_eq!(users[0].role, Some(Role::Admin));
    }
}
