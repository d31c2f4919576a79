use crate::error::{AppError, Result};
use crate::model::{
    BatchRequestItem, BatchResponseItem, ShortenRequest, ShortenResponse, UserUrlResponse,
};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use portal_core::{ShortenerError, User};
use url::Url;

/// `POST /` with the original URL as a plain-text body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    body: String,
) -> Result<Response> {
    match state.shortener.shorten(&user, &body).await {
        Ok(short_url) => Ok((StatusCode::CREATED, short_url).into_response()),
        Err(ShortenerError::Conflict { short_url }) => {
            Ok((StatusCode::CONFLICT, short_url).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /api/shorten` with `{"url": ...}`.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ShortenRequest>,
) -> Result<Response> {
    let (status, result) = match state.shortener.shorten(&user, &request.url).await {
        Ok(short_url) => (StatusCode::CREATED, short_url),
        Err(ShortenerError::Conflict { short_url }) => (StatusCode::CONFLICT, short_url),
        Err(e) => return Err(e.into()),
    };
    Ok((status, Json(ShortenResponse { result })).into_response())
}

pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(items): Json<Vec<BatchRequestItem>>,
) -> Result<(StatusCode, Json<Vec<BatchResponseItem>>)> {
    let results = state
        .shortener
        .shorten_batch(&user, items.into_iter().map(Into::into).collect())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(results.into_iter().map(Into::into).collect()),
    ))
}

/// `GET /{short_code}`: 307 to the original URL.
pub async fn redirect_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let original_url = state.redirector.resolve(&short_code).await?;

    // Location must be ASCII; the URL parser percent-encodes the rest.
    let location = Url::parse(&original_url)
        .map(String::from)
        .unwrap_or(original_url);
    let location = HeaderValue::try_from(location)
        .map_err(|e| AppError::Internal(format!("unusable redirect target: {e}")))?;

    Ok((
        StatusCode::TEMPORARY_REDIRECT,
        [(header::LOCATION, location)],
    )
        .into_response())
}

pub async fn list_user_urls_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Response> {
    let urls = state.shortener.list_user_urls(&user).await?;
    if urls.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<UserUrlResponse> = urls.into_iter().map(Into::into).collect();
    Ok(Json(body).into_response())
}

/// `DELETE /api/user/urls` with a JSON array of codes. Deletion happens later.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(codes): Json<Vec<String>>,
) -> Result<StatusCode> {
    state.shortener.delete_batch(&user, codes).await?;
    Ok(StatusCode::ACCEPTED)
}
