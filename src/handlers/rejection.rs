//! Turns rejections into JSON error responses
//!
//! Every failure answers with `{"error": <message>, "reason": <kind>}` so
//! clients can tell rejection paths apart without parsing messages.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

use crate::error::VetClinicError;

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub reason: String,
}

pub fn error_reply(status: StatusCode, reason: &str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
        reason: reason.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// Recover handler for the whole API
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<VetClinicError>() {
        let status = e.status_code();
        if status.is_server_error() {
            // Internal details stay in the log
            log::error!("Request failed: {}", e);
            return Ok(error_reply(status, e.reason(), "internal server error"));
        }
        return Ok(error_reply(status, e.reason(), e.to_string()));
    }

    let reply = if err.is_not_found() {
        error_reply(StatusCode::NOT_FOUND, "route_not_found", "route not found")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        error_reply(StatusCode::BAD_REQUEST, "invalid_body", e.to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        error_reply(StatusCode::BAD_REQUEST, "invalid_query", "invalid query string")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_reply(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "request body too large",
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        error_reply(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            "expected application/json",
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        error_reply(
            StatusCode::LENGTH_REQUIRED,
            "length_required",
            "content-length required",
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "method not allowed",
        )
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal server error",
        )
    };

    Ok(reply)
}
