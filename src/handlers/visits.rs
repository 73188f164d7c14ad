//! Visit routes

use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use crate::auth::RequestContext;
use crate::core::payload::{
    DeleteResponse, VisitHistoryResponse, VisitQuery, VisitRequest, VisitResponse,
};
use crate::core::AppState;
use crate::handlers::{admin_only, authenticated, json_body, json_reply, with_state};
use crate::storage::EntityId;

pub fn routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let create = warp::path!("visits")
        .and(warp::post())
        .and(admin_only(state))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(create_visit);

    let list = warp::path!("visits")
        .and(warp::get())
        .and(authenticated(state))
        .and(warp::query::<VisitQuery>())
        .and(with_state(state.clone()))
        .and_then(list_visits);

    let get = warp::path!("visits" / EntityId)
        .and(warp::get())
        .and(authenticated(state))
        .and(with_state(state.clone()))
        .and_then(get_visit);

    let update = warp::path!("visits" / EntityId)
        .and(warp::put())
        .and(admin_only(state))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(update_visit);

    let delete = warp::path!("visits" / EntityId)
        .and(warp::delete())
        .and(admin_only(state))
        .and(with_state(state.clone()))
        .and_then(delete_visit);

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

async fn create_visit(
    ctx: RequestContext,
    body: VisitRequest,
    state: AppState,
) -> Result<Response, Rejection> {
    let visit = state
        .clinic
        .create_visit(&ctx, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::CREATED, &VisitResponse::from(visit)))
}

/// `?vet=`, `?reason=` or `?date=`; the first non-empty one applies
async fn list_visits(
    ctx: RequestContext,
    query: VisitQuery,
    state: AppState,
) -> Result<Response, Rejection> {
    log::debug!("[{}] listing visits", ctx.request_id);
    let visits = state
        .clinic
        .list_visits(query)
        .await
        .map_err(warp::reject::custom)?;
    let visits: Vec<VisitHistoryResponse> = visits.into_iter().map(Into::into).collect();
    Ok(json_reply(StatusCode::OK, &visits))
}

async fn get_visit(
    id: EntityId,
    _ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let visit = state.clinic.get_visit(id).await.map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &VisitHistoryResponse::from(visit)))
}

async fn update_visit(
    id: EntityId,
    ctx: RequestContext,
    body: VisitRequest,
    state: AppState,
) -> Result<Response, Rejection> {
    let visit = state
        .clinic
        .update_visit(&ctx, id, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &VisitResponse::from(visit)))
}

async fn delete_visit(
    id: EntityId,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let summary = state
        .clinic
        .delete_visit(&ctx, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(
        StatusCode::OK,
        &DeleteResponse::cascade("Visit deleted successfully", summary),
    ))
}
