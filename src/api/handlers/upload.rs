use crate::AppState;
use crate::api::error::AppError;
use crate::models::UploadResult;
use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{HeaderMap, HeaderValue, header},
    response::{Html, Response},
};
use tracing::warn;

pub const JSON_CONTENT_TYPE: &str = "application/json";

const INDEX_PAGE: &str = include_str!("../../../static/index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Error".to_string())
}

/// Stores every file part of a multipart body and answers with the manifest.
///
/// Parts without a form name or file name are skipped. A body that turns out
/// to be malformed ends the loop; the files handled so far are still reported.
pub async fn upload_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut result = UploadResult::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped reading multipart body: {}", e);
                break;
            }
        };

        let form_name = field.name().unwrap_or_default();
        let file_name = field.file_name().unwrap_or_default().to_string();
        if form_name.is_empty() || file_name.is_empty() {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();

        let outcome = state
            .upload_service
            .store_part(&file_name, &content_type, field)
            .await;
        let interrupted = outcome.is_interrupted();
        result.files.push(outcome.into_info());
        if interrupted {
            break;
        }
    }

    manifest_response(&headers, &result)
}

fn manifest_response(headers: &HeaderMap, result: &UploadResult) -> Result<Response, AppError> {
    let mut body = serde_json::to_string(result).map_err(|e| AppError::Internal(e.to_string()))?;
    body.push('\n');

    let mut response = Response::new(Body::from(body));
    if accepts_json(headers) {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
    }
    Ok(response)
}

/// Substring match on `Accept`, so `application/json, text/javascript, */*`
/// from the upload widget counts.
fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(JSON_CONTENT_TYPE))
}
