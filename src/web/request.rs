use axum::extract::{FromRequest, Path, Request};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, RequestExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::web::HandlerResult;

/// JSON answer with `status`. `204 No Content` is sent without a body.
pub fn respond<T: Serialize>(status: StatusCode, data: T) -> HandlerResult {
    if status == StatusCode::NO_CONTENT {
        return Ok(status.into_response());
    }
    Ok((status, Json(data)).into_response())
}

/// Path parameters of the matched route.
pub async fn params<T>(req: &mut Request) -> Result<T, AppError>
where
    T: DeserializeOwned + Send + 'static,
{
    req.extract_parts::<Path<T>>()
        .await
        .map(|Path(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// JSON request body.
pub async fn decode<T>(req: Request) -> Result<T, AppError>
where
    T: DeserializeOwned,
{
    Json::<T>::from_request(req, &())
        .await
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}
