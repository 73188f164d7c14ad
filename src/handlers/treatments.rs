//! Treatment routes

use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use crate::auth::RequestContext;
use crate::core::payload::{DeleteResponse, TreatmentRequest, TreatmentResponse};
use crate::core::AppState;
use crate::handlers::{admin_only, authenticated, json_body, json_reply, with_state};
use crate::storage::EntityId;

pub fn routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let create = warp::path!("treatments")
        .and(warp::post())
        .and(admin_only(state))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(create_treatment);

    let list = warp::path!("treatments")
        .and(warp::get())
        .and(authenticated(state))
        .and(with_state(state.clone()))
        .and_then(list_treatments);

    let get = warp::path!("treatments" / EntityId)
        .and(warp::get())
        .and(authenticated(state))
        .and(with_state(state.clone()))
        .and_then(get_treatment);

    // The id here is a visit id
    let by_visit = warp::path!("treatments" / EntityId / "history")
        .and(warp::get())
        .and(authenticated(state))
        .and(with_state(state.clone()))
        .and_then(visit_treatments);

    let update = warp::path!("treatments" / EntityId)
        .and(warp::put())
        .and(admin_only(state))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(update_treatment);

    let delete = warp::path!("treatments" / EntityId)
        .and(warp::delete())
        .and(admin_only(state))
        .and(with_state(state.clone()))
        .and_then(delete_treatment);

    create
        .or(list)
        .unify()
        .or(get)
        .unify()
        .or(by_visit)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

async fn create_treatment(
    ctx: RequestContext,
    body: TreatmentRequest,
    state: AppState,
) -> Result<Response, Rejection> {
    let treatment = state
        .clinic
        .create_treatment(&ctx, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(
        StatusCode::CREATED,
        &TreatmentResponse::from(treatment),
    ))
}

async fn list_treatments(ctx: RequestContext, state: AppState) -> Result<Response, Rejection> {
    log::debug!("[{}] listing treatments", ctx.request_id);
    let treatments = state
        .clinic
        .list_treatments()
        .await
        .map_err(warp::reject::custom)?;
    let treatments: Vec<TreatmentResponse> = treatments.into_iter().map(Into::into).collect();
    Ok(json_reply(StatusCode::OK, &treatments))
}

async fn get_treatment(
    id: EntityId,
    _ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let treatment = state
        .clinic
        .get_treatment(id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &TreatmentResponse::from(treatment)))
}

async fn visit_treatments(
    visit_id: EntityId,
    _ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let treatments = state
        .clinic
        .visit_treatments(visit_id)
        .await
        .map_err(warp::reject::custom)?;
    let treatments: Vec<TreatmentResponse> = treatments.into_iter().map(Into::into).collect();
    Ok(json_reply(StatusCode::OK, &treatments))
}

async fn update_treatment(
    id: EntityId,
    ctx: RequestContext,
    body: TreatmentRequest,
    state: AppState,
) -> Result<Response, Rejection> {
    let treatment = state
        .clinic
        .update_treatment(&ctx, id, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(StatusCode::OK, &TreatmentResponse::from(treatment)))
}

async fn delete_treatment(
    id: EntityId,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    state
        .clinic
        .delete_treatment(&ctx, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(json_reply(
        StatusCode::OK,
        &DeleteResponse::message("Treatment deleted successfully"),
    ))
}
