//! HTTP routes of the clinic API
//!
//! Protected routes run the auth gate right after path and method matching,
//! and before the body is read, so an unauthenticated request never reaches
//! validation. Mutations add the role gate when roles are enabled.

pub mod auth;
pub mod cats;
pub mod rejection;
pub mod treatments;
pub mod users;
pub mod visits;

use std::convert::Infallible;

use serde::de::DeserializeOwned;
use serde::Serialize;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::auth::{with_auth, with_role, RequestContext, Role};
use crate::constants::{API_PREFIX, MAX_BODY_BYTES};
use crate::core::AppState;
use crate::security::with_api_security_headers;

pub use rejection::{handle_rejection, ErrorBody};

/// Auth gate for routes any signed-in caller may use
pub(crate) fn authenticated(state: &AppState) -> BoxedFilter<(RequestContext,)> {
    with_auth(state.tokens.access().clone(), state.roles_enabled)
}

/// Auth gate followed by the admin role gate
pub(crate) fn admin_only(state: &AppState) -> BoxedFilter<(RequestContext,)> {
    with_role(authenticated(state), Role::Admin, state.roles_enabled)
}

pub(crate) fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub(crate) fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub(crate) fn json_reply<T: Serialize>(status: StatusCode, value: &T) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

fn health_routes() -> BoxedFilter<(Response,)> {
    let root = warp::path::end();
    let health = warp::path("health").and(warp::path::end());

    root.or(health)
        .unify()
        .and(warp::get())
        .map(|| {
            json_reply(
                StatusCode::OK,
                &Health {
                    status: "ok",
                    service: "vet-clinic",
                },
            )
        })
        .boxed()
}

/// Every resource route under the API prefix
fn resource_routes(state: &AppState) -> BoxedFilter<(Response,)> {
    warp::path(API_PREFIX[0])
        .and(warp::path(API_PREFIX[1]))
        .and(warp::path(API_PREFIX[2]))
        .and(
            auth::routes(state)
                .or(users::routes(state))
                .unify()
                .or(cats::routes(state))
                .unify()
                .or(visits::routes(state))
                .unify()
                .or(treatments::routes(state))
                .unify(),
        )
        .boxed()
}

/// The full API: routes, error mapping, security headers, CORS and access log
pub fn api_routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_headers(vec!["Accept", "Authorization", "Content-Type", "X-CSRF-Token"]);

    health_routes()
        .or(resource_routes(&state))
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(with_api_security_headers())
        .with(cors)
        .with(warp::log("vet_clinic::access"))
}
