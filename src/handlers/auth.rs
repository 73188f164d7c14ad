//! Public token endpoints: login and refresh

use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use crate::core::payload::{AccessTokenResponse, LoginRequest, RefreshTokenRequest};
use crate::core::AppState;
use crate::handlers::{json_body, json_reply, with_state};

/// `POST users/login` and `POST users/refresh`, both ungated
pub fn routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let login = warp::path!("users" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handle_login);

    let refresh = warp::path!("users" / "refresh")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handle_refresh);

    login.or(refresh).unify().boxed()
}

async fn handle_login(body: LoginRequest, state: AppState) -> Result<Response, Rejection> {
    let pair = state
        .accounts
        .login(body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &pair))
}

async fn handle_refresh(body: RefreshTokenRequest, state: AppState) -> Result<Response, Rejection> {
    let access_token = state
        .accounts
        .refresh(body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(
        StatusCode::OK,
        &AccessTokenResponse { access_token },
    ))
}
