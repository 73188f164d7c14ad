//! User account routes

use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use crate::auth::RequestContext;
use crate::core::payload::{DeleteResponse, UserRequest, UserResponse};
use crate::core::AppState;
use crate::handlers::{admin_only, authenticated, json_body, json_reply, with_state};
use crate::storage::EntityId;

pub fn routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let create = warp::path!("users")
        .and(warp::post())
        .and(admin_only(state))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(create_user);

    let list = warp::path!("users")
        .and(warp::get())
        .and(authenticated(state))
        .and(with_state(state.clone()))
        .and_then(list_users);

    let get = warp::path!("users" / EntityId)
        .and(warp::get())
        .and(authenticated(state))
        .and(with_state(state.clone()))
        .and_then(get_user);

    let update = warp::path!("users" / EntityId)
        .and(warp::put())
        .and(admin_only(state))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(update_user);

    let delete = warp::path!("users" / EntityId)
        .and(warp::delete())
        .and(admin_only(state))
        .and(with_state(state.clone()))
        .and_then(delete_user);

    create
        .or(list)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

async fn create_user(
    ctx: RequestContext,
    body: UserRequest,
    state: AppState,
) -> Result<Response, Rejection> {
    let user = state
        .accounts
        .create_user(&ctx, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::CREATED, &UserResponse::from(user)))
}

async fn list_users(ctx: RequestContext, state: AppState) -> Result<Response, Rejection> {
    log::debug!("[{}] listing users", ctx.request_id);
    let users = state
        .accounts
        .list_users()
        .await
        .map_err(warp::reject::custom)?;
    let users: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
    Ok(json_reply(StatusCode::OK, &users))
}

async fn get_user(
    id: EntityId,
    _ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let user = state
        .accounts
        .get_user(id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &UserResponse::from(user)))
}

async fn update_user(
    id: EntityId,
    ctx: RequestContext,
    body: UserRequest,
    state: AppState,
) -> Result<Response, Rejection> {
    let user = state
        .accounts
        .update_user(&ctx, id, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &UserResponse::from(user)))
}

async fn delete_user(
    id: EntityId,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    state
        .accounts
        .delete_user(&ctx, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(
        StatusCode::OK,
        &DeleteResponse::message("User deleted successfully"),
    ))
}
