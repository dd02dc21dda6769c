use crate::AppState;
use crate::api::error::AppError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
};

/// `POST /printer/:printername/file/:filename`
pub async fn print_file(
    State(state): State<AppState>,
    Path((printer_name, file_name)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.print_service.print(&printer_name, &file_name).await?;
    Ok(StatusCode::OK)
}
