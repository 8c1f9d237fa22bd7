use super::AppError;
use crate::{
    auth::{current_user, AuthState},
    inference::InferencePool,
    storage::Database,
};
use axum::{
    extract::{multipart::MultipartRejection, Extension, Multipart},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

pub const UPLOAD_FIELD: &str = "file";
pub const DETECTIONS_HEADER: &str = "x-detections";

/// Multipart body for `/predict`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct PredictUpload {
    /// Image to annotate (any format the decoder understands)
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[utoipa::path(
    post,
    path= "/predict",
    request_body(content = PredictUpload, content_type = "multipart/form-data"),
    responses (
        (status = 200, description = "Annotated image", content_type = "image/jpeg"),
        (status = 400, description = "Missing file or undecodable image"),
        (status = 401, description = "No valid session"),
        (status = 503, description = "Inference queue is full"),
        (status = 504, description = "Inference timed out"),
    ),
    tag= "detection"
)]
#[instrument(skip_all)]
pub async fn predict(
    headers: HeaderMap,
    db: Extension<Database>,
    auth: Extension<AuthState>,
    inference: Extension<Arc<InferencePool>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let Some(user) = current_user(&headers, &auth, &db).await? else {
        return Err(AppError::Unauthorized);
    };

    // Checked after the session so anonymous callers always see 401
    let multipart = multipart.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let upload = read_upload(multipart).await?;
    debug!(user_id = user.id, bytes = upload.len(), "Image received");

    let annotated = inference.annotate(upload).await?;
    info!(
        user_id = user.id,
        detections = annotated.detections.len(),
        "Image annotated"
    );

    let summary = HeaderValue::from_str(&annotated.summary())?;
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("image/jpeg")),
            (HeaderName::from_static(DETECTIONS_HEADER), summary),
        ],
        annotated.jpeg,
    )
        .into_response())
}

/// Bytes of the `file` field; other fields are skipped.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }
        return Ok(bytes.to_vec());
    }

    Err(AppError::BadRequest(format!(
        "Missing multipart field `{UPLOAD_FIELD}`"
    )))
}
