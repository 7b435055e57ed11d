//! Multipart product forms.
//!
//! Everything here runs before the asset manager sees a byte: at most
//! [`MAX_PRODUCT_IMAGES`] files, each at most [`MAX_IMAGE_BYTES`], and both
//! the extension and the declared MIME type must be an accepted image type.

use crate::{
    assets::AssetUpload,
    errors::AppError,
    models::product::MAX_PRODUCT_IMAGES,
    services::product_service::ProductFields,
};
use axum::{
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};
use bytes::BytesMut;
use std::path::Path;
use thiserror::Error;

pub const IMAGE_FIELD: &str = "images";
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Request body cap for routes accepting product forms.
pub const MAX_FORM_BYTES: usize = MAX_PRODUCT_IMAGES * MAX_IMAGE_BYTES + 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "webp"];
const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only image files are allowed (jpg, jpeg, png, webp)")]
    UnsupportedType,
    #[error("Too many files: at most {MAX_PRODUCT_IMAGES} images are allowed")]
    TooManyFiles,
    #[error("File `{0}` exceeds the 5 MB limit")]
    TooLarge(String),
    #[error("File `{0}` is empty")]
    EmptyFile(String),
    #[error("Unexpected file field `{0}`")]
    UnexpectedField(String),
    #[error("Field `{field}` is invalid: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("Malformed multipart body: {0}")]
    Malformed(String),
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError::Malformed(err.body_text())
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let status = match err {
            UploadError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        AppError::new(status, err.to_string())
    }
}

/// Check one file's name and declared type.
pub fn validate_image(original_name: &str, content_type: &str) -> Result<(), UploadError> {
    let extension_ok = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    let mime_ok = ALLOWED_MIME_TYPES.contains(&content_type.to_ascii_lowercase().as_str());

    if extension_ok && mime_ok {
        Ok(())
    } else {
        Err(UploadError::UnsupportedType)
    }
}

/// A parsed product form: text fields plus image files in upload order.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub fields: ProductFields,
    pub images: Vec<AssetUpload>,
}

impl ProductForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, UploadError> {
        let mut form = ProductForm::default();

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name().map(str::to_string) {
                if name != IMAGE_FIELD {
                    return Err(UploadError::UnexpectedField(name));
                }
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                validate_image(&file_name, &content_type)?;
                if form.images.len() >= MAX_PRODUCT_IMAGES {
                    return Err(UploadError::TooManyFiles);
                }

                let mut buf = BytesMut::new();
                while let Some(chunk) = field.chunk().await? {
                    if buf.len() + chunk.len() > MAX_IMAGE_BYTES {
                        return Err(UploadError::TooLarge(file_name));
                    }
                    buf.extend_from_slice(&chunk);
                }
                if buf.is_empty() {
                    return Err(UploadError::EmptyFile(file_name));
                }

                form.images.push(AssetUpload {
                    content: buf.freeze(),
                    original_name: file_name,
                    content_type,
                });
            } else {
                let value = field.text().await?;
                form.set_field(&name, value)?;
            }
        }

        Ok(form)
    }

    /// Apply one text field. Unknown fields are ignored; an empty value
    /// counts as not provided.
    fn set_field(&mut self, name: &str, value: String) -> Result<(), UploadError> {
        let trimmed = value.trim().to_string();
        let invalid = |reason: &str| UploadError::InvalidField {
            field: name.to_string(),
            reason: reason.to_string(),
        };

        match name {
            "title" => self.fields.title = Some(value),
            "description" => self.fields.description = Some(value),
            "est_price" | "estPrice" | "price" if !trimmed.is_empty() => {
                let price = trimmed
                    .parse::<f64>()
                    .map_err(|_| invalid("must be a number"))?;
                self.fields.est_price = Some(price);
            }
            "is_active" | "isActive" if !trimmed.is_empty() => {
                let active = match trimmed.to_ascii_lowercase().as_str() {
                    "true" | "1" | "on" => true,
                    "false" | "0" | "off" => false,
                    _ => return Err(invalid("must be true or false")),
                };
                self.fields.is_active = Some(active);
            }
            _ => {}
        }
        Ok(())
    }
}
