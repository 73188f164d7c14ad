//! Authentication and authorization module

pub mod gate;
pub mod password;
pub mod token;
pub mod user;

// Re-export main components
pub use gate::{authenticate, extract_bearer_token, require_role, with_auth, with_role, RequestContext};
pub use password::CredentialVerifier;
pub use token::{AuthTokens, ClaimSet, TokenCodec, TokenPair};
pub use user::{Identity, Role};
