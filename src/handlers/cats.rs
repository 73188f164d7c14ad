//! Cat routes

use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use crate::auth::RequestContext;
use crate::core::payload::{CatHistoryResponse, CatRequest, CatResponse, DeleteResponse};
use crate::core::AppState;
use crate::handlers::{admin_only, authenticated, json_body, json_reply, with_state};
use crate::storage::EntityId;

pub fn routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let create = warp::path!("cats")
        .and(warp::post())
        .and(admin_only(state))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(create_cat);

    let list = warp::path!("cats")
        .and(warp::get())
        .and(authenticated(state))
        .and(with_state(state.clone()))
        .and_then(list_cats);

    let get = warp::path!("cats" / EntityId)
        .and(warp::get())
        .and(authenticated(state))
        .and(with_state(state.clone()))
        .and_then(get_cat);

    let history = warp::path!("cats" / EntityId / "history")
        .and(warp::get())
        .and(authenticated(state))
        .and(with_state(state.clone()))
        .and_then(cat_history);

    let update = warp::path!("cats" / EntityId)
        .and(warp::put())
        .and(admin_only(state))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(update_cat);

    let delete = warp::path!("cats" / EntityId)
        .and(warp::delete())
        .and(admin_only(state))
        .and(with_state(state.clone()))
        .and_then(delete_cat);

    create
        .or(list)
        .unify()
        .or(get)
        .unify()
        .or(history)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

async fn create_cat(
    ctx: RequestContext,
    body: CatRequest,
    state: AppState,
) -> Result<Response, Rejection> {
    let cat = state
        .clinic
        .create_cat(&ctx, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::CREATED, &CatResponse::from(cat)))
}

async fn list_cats(ctx: RequestContext, state: AppState) -> Result<Response, Rejection> {
    log::debug!("[{}] listing cats", ctx.request_id);
    let cats = state.clinic.list_cats().await.map_err(warp::reject::custom)?;
    let cats: Vec<CatResponse> = cats.into_iter().map(Into::into).collect();
    Ok(json_reply(StatusCode::OK, &cats))
}

async fn get_cat(
    id: EntityId,
    _ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let cat = state.clinic.get_cat(id).await.map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &CatResponse::from(cat)))
}

async fn cat_history(
    id: EntityId,
    _ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let history = state
        .clinic
        .cat_history(id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &CatHistoryResponse::from(history)))
}

async fn update_cat(
    id: EntityId,
    ctx: RequestContext,
    body: CatRequest,
    state: AppState,
) -> Result<Response, Rejection> {
    let cat = state
        .clinic
        .update_cat(&ctx, id, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &CatResponse::from(cat)))
}

async fn delete_cat(
    id: EntityId,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let summary = state
        .clinic
        .delete_cat(&ctx, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(
        StatusCode::OK,
        &DeleteResponse::cascade("Cat deleted successfully", summary),
    ))
}
