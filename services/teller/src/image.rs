//! Image routes

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::{StreamExt as _, TryStreamExt as _, stream};
use serde::Deserialize;

use crate::api::TellerState;
use crate::error::{TellerError, TellerResult};

/// Router for image operations
pub fn router() -> Router<TellerState> {
    Router::new()
        .route("/images", get(index).post(create))
        .route("/images/{id}", get(show).put(update).delete(delete))
}

#[derive(Debug, Deserialize)]
struct ShowParams {
    registry: Option<String>,
}

/// Stream the bytes of an image.
///
/// The status is only decided once the first chunk is available, so that
/// failures to open the first file still produce an error status. Later
/// failures abort the response body.
async fn show(
    State(state): State<TellerState>,
    Path(id): Path<String>,
    Query(params): Query<ShowParams>,
) -> TellerResult<Response> {
    let image = state
        .registries()
        .lookup(params.registry.as_deref(), &id)
        .await?;
    let length = image.size().ok_or_else(|| TellerError::InvalidMetadata {
        registry: params
            .registry
            .clone()
            .unwrap_or_else(|| state.registries().default_name().to_owned()),
        source: format!("total size of image {id} overflows").into(),
    })?;

    let mut chunks = state.assembler().stream(image);
    let first = match chunks.next().await {
        Some(Ok(chunk)) => Some(chunk),
        Some(Err(error)) => return Err(error.into()),
        None => None,
    };

    let body = stream::iter(first.map(Ok))
        .chain(chunks)
        .inspect_err(move |error| {
            tracing::error!(image = %id, location = error.location(), "image stream aborted: {error}");
        });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, state.content_type().clone()),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// List images
async fn index() -> TellerResult<Response> {
    Err(TellerError::NotImplemented)
}

/// Create an image
async fn create() -> TellerResult<Response> {
    Err(TellerError::NotImplemented)
}

/// Update an image
async fn update() -> TellerResult<Response> {
    Err(TellerError::NotImplemented)
}

/// Delete an image
async fn delete() -> TellerResult<Response> {
    Err(TellerError::NotImplemented)
}
