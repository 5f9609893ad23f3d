//! Multipart form parsing shared by every DEM upload endpoint.

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::error::{AppError, AppResult};
use crate::orchestration::{Upload, MISSING_FILE_MESSAGE};

/// Binary DEM raster.
pub const FIELD_DEM_FILE: &str = "demFile";
/// Human-readable name of the uploaded file.
pub const FIELD_ORIGINAL_FILE_NAME: &str = "originalFileName";
pub const FIELD_VOLUME_TYPE: &str = "volumeType";
pub const FIELD_APPROXIMATION_TYPE: &str = "approximationType";
/// Client-chosen id grouping volume outputs with an earlier job.
pub const FIELD_PROCESS_ID: &str = "processId";

/// Fields read from a DEM upload form. Unknown fields are ignored.
#[derive(Debug, Default)]
pub struct DemForm {
    pub file: Option<(Option<String>, Bytes)>,
    pub original_file_name: Option<String>,
    pub volume_type: Option<String>,
    pub approximation_type: Option<String>,
    pub process_id: Option<String>,
}

impl DemForm {
    /// Drain the multipart stream.
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = DemForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                FIELD_DEM_FILE => {
                    let file_name = field.file_name().map(str::to_string);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.file = Some((file_name, data));
                }
                FIELD_ORIGINAL_FILE_NAME
                | FIELD_VOLUME_TYPE
                | FIELD_APPROXIMATION_TYPE
                | FIELD_PROCESS_ID => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    let value = Some(text).filter(|t| !t.trim().is_empty());
                    match name.as_str() {
                        FIELD_ORIGINAL_FILE_NAME => form.original_file_name = value,
                        FIELD_VOLUME_TYPE => form.volume_type = value,
                        FIELD_APPROXIMATION_TYPE => form.approximation_type = value,
                        _ => form.process_id = value,
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Take the uploaded file, failing with 400 if it is absent or empty.
    pub fn take_upload(&mut self) -> AppResult<Upload> {
        let (file_name, bytes) = self
            .file
            .take()
            .filter(|(_, bytes)| !bytes.is_empty())
            .ok_or_else(|| AppError::BadRequest(MISSING_FILE_MESSAGE.into()))?;
        Ok(Upload {
            bytes,
            file_name,
            display_name: self.original_file_name.clone(),
        })
    }

    /// A required text field, failing with 400 when missing.
    pub fn required<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
        value
            .as_deref()
            .ok_or_else(|| AppError::BadRequest(format!("Missing required '{field}' field")))
    }
}
