//! # Request Extraction & Validation
//!
//! JSON bodies go through [`extract_json`] / [`extract_validated_json`], so a
//! body serde cannot parse is `BAD_REQUEST` and a parsed body that breaks a
//! business rule is `VALIDATION_ERROR`.
//!
//! Multipart uploads (PDF documents, bundle files) go through
//! [`read_upload`], which collects the named file part and any text parts.

use std::collections::HashMap;

use axum::extract::multipart::Multipart;
use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Business-rule checks for request DTOs, run after deserialization.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON body, mapping rejections to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// [`extract_json`] followed by [`Validate::validate`].
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Reject blank values of required string fields.
pub fn require_non_blank(fields: &[(&str, &str)]) -> Result<(), String> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(format!("{name} is required")),
        None => Ok(()),
    }
}

/// A multipart upload: one file part plus any text parts.
#[derive(Debug, Default)]
pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
    pub fields: HashMap<String, String>,
}

impl Upload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// Drain `multipart`, keeping the bytes of the part named `file_field`.
///
/// Missing or empty file part is a validation error.
pub async fn read_upload(mut multipart: Multipart, file_field: &str) -> Result<Upload, AppError> {
    let mut upload = Upload::default();
    let mut found = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            upload.file_name = field.file_name().map(str::to_string);
            upload.bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?
                .to_vec();
            found = true;
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            upload.fields.insert(name, value);
        }
    }

    if !found || upload.bytes.is_empty() {
        return Err(AppError::Validation(format!(
            "multipart field '{file_field}' with a non-empty file is required"
        )));
    }
    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_field_is_named() {
        let err = require_non_blank(&[("name", "Uni"), ("email", "  ")]).unwrap_err();
        assert_eq!(err, "email is required");
        assert!(require_non_blank(&[("name", "Uni")]).is_ok());
    }

    #[test]
    fn blank_text_part_reads_as_absent() {
        let mut upload = Upload::default();
        upload.fields.insert("certificateId".into(), " ".into());
        upload.fields.insert("grade".into(), "9.5".into());
        assert_eq!(upload.field("certificateId"), None);
        assert_eq!(upload.field("grade"), Some("9.5"));
    }
}
