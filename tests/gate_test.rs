use std::sync::Arc;

use uuid::Uuid;
use warp::Filter;

use vet_clinic::auth::{
    authenticate, require_role, with_auth, with_role, Identity, RequestContext, Role, TokenCodec,
};
use vet_clinic::error::{TokenError, VetClinicError};

const SECRET: &str = "gate-test-access-key-0123456789abcdef";

fn codec() -> TokenCodec {
    TokenCodec::new(Some(SECRET))
}

fn bearer(role: Option<Role>) -> String {
    let token = codec()
        .issue(&Identity::claims("vet@clinic.test", role), 1)
        .unwrap();
    format!("Bearer {}", token)
}

fn context(role: Option<Role>) -> RequestContext {
    RequestContext {
        request_id: Uuid::new_v4(),
        email: "vet@clinic.test".to_string(),
        role,
    }
}

#[test]
fn test_role_gate_accepts_only_equal_roles() {
    let roles = [Some(Role::User), Some(Role::Admin), None];
    let required = [Role::User, Role::Admin];

    for held in roles {
        for needed in required {
            let result = require_role(&context(held), needed);
            if held == Some(needed) {
                assert!(result.is_ok(), "{:?} should satisfy {:?}", held, needed);
            } else {
                assert!(
                    matches!(result, Err(VetClinicError::Forbidden(_))),
                    "{:?} should not satisfy {:?}",
                    held,
                    needed
                );
            }
        }
    }
}

#[test]
fn test_missing_or_empty_header_is_unauthenticated() {
    for header in [None, Some(""), Some("   "), Some("Bearer "), Some("Bearer    ")] {
        let result = authenticate(header, &codec(), true);
        assert!(
            matches!(result, Err(VetClinicError::Unauthenticated(_))),
            "header {:?}",
            header
        );
    }
}

#[test]
fn test_prefix_is_stripped_tolerantly() {
    let header = bearer(Some(Role::User));
    let token = header.trim_start_matches("Bearer ").to_string();

    for header in [
        header.clone(),
        format!("bearer {}", token),
        format!("  Bearer   {}  ", token),
        token.clone(),
    ] {
        let ctx = authenticate(Some(&header), &codec(), true).unwrap();
        assert_eq!(ctx.email, "vet@clinic.test");
        assert_eq!(ctx.role, Some(Role::User));
    }
}

#[test]
fn test_token_from_other_secret_is_unauthenticated() {
    let other = TokenCodec::new(Some("some-other-access-key-0123456789abcd"));
    let token = other
        .issue(&Identity::claims("vet@clinic.test", Some(Role::Admin)), 1)
        .unwrap();

    let err = authenticate(Some(&format!("Bearer {}", token)), &codec(), true).unwrap_err();
    assert!(matches!(err, VetClinicError::Token(TokenError::InvalidSignature)));
    assert_eq!(err.reason(), "unauthenticated");
}

#[test]
fn test_roles_disabled_drops_role_from_context() {
    let ctx = authenticate(Some(&bearer(Some(Role::Admin))), &codec(), false).unwrap();
    assert_eq!(ctx.role, None);
}

#[test]
fn test_each_request_gets_its_own_id() {
    let header = bearer(None);
    let first = authenticate(Some(&header), &codec(), true).unwrap();
    let second = authenticate(Some(&header), &codec(), true).unwrap();
    assert_ne!(first.request_id, second.request_id);
}

#[tokio::test]
async fn test_auth_filter_injects_context() {
    let filter = with_auth(Arc::new(codec()), true);

    let ctx = warp::test::request()
        .header("authorization", bearer(Some(Role::Admin)))
        .filter(&filter)
        .await
        .unwrap();
    assert_eq!(ctx.role, Some(Role::Admin));

    assert!(warp::test::request().filter(&filter).await.is_err());
}

#[tokio::test]
async fn test_role_filter_runs_after_auth() {
    let admin = with_role(with_auth(Arc::new(codec()), true), Role::Admin, true)
        .map(|ctx: RequestContext| ctx.email);

    let allowed = warp::test::request()
        .header("authorization", bearer(Some(Role::Admin)))
        .filter(&admin)
        .await;
    assert_eq!(allowed.unwrap(), "vet@clinic.test");

    let response = warp::test::request()
        .header("authorization", bearer(Some(Role::User)))
        .reply(&admin.clone().recover(vet_clinic::handlers::handle_rejection))
        .await;
    assert_eq!(response.status(), 403);

    let response = warp::test::request()
        .reply(&admin.clone().recover(vet_clinic::handlers::handle_rejection))
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_role_filter_is_absent_when_roles_disabled() {
    let open = with_role(with_auth(Arc::new(codec()), false), Role::Admin, false);

    let ctx = warp::test::request()
        .header("authorization", bearer(Some(Role::User)))
        .filter(&open)
        .await
        .unwrap();
    assert_eq!(ctx.role, None);
}
