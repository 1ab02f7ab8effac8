//! Image upload validation for snack photos and payment proofs.

use thiserror::Error;

use crate::models::StoredImage;

/// Content types accepted for uploaded images.
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// Reasons an uploaded image is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("image file is required")]
    Empty,

    #[error("image file size must be at most {max_mb}MB")]
    TooLarge { max_mb: u64 },

    #[error("image file must be image/jpeg, image/png or image/gif (got {0})")]
    UnsupportedType(String),
}

/// Check an uploaded file and package it for storage.
///
/// # Errors
///
/// Returns `UploadError` if the file is empty, too large or not an allowed
/// image type.
pub fn validate_image(
    content_type: Option<&str>,
    bytes: Vec<u8>,
    max_bytes: u64,
) -> Result<StoredImage, UploadError> {
    let content_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(UploadError::UnsupportedType(if content_type.is_empty() {
            "none".to_owned()
        } else {
            content_type
        }));
    }

    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }

    if u64::try_from(bytes.len()).unwrap_or(u64::MAX) > max_bytes {
        return Err(UploadError::TooLarge {
            max_mb: max_bytes / (1024 * 1024),
        });
    }

    Ok(StoredImage {
        bytes,
        content_type,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_accepts_allowed_types() {
        for ct in ALLOWED_IMAGE_TYPES {
            let img = validate_image(Some(ct), vec![1, 2, 3], MB).unwrap();
            assert_eq!(img.content_type, ct);
            assert_eq!(img.bytes.len(), 3);
        }
    }

    #[test]
    fn test_normalizes_content_type_parameters() {
        let img = validate_image(Some("Image/PNG; charset=binary"), vec![0], MB).unwrap();
        assert_eq!(img.content_type, "image/png");
    }

    #[test]
    fn test_rejects_other_types() {
        assert_eq!(
            validate_image(Some("application/pdf"), vec![0], MB).unwrap_err(),
            UploadError::UnsupportedType("application/pdf".into())
        );
        assert_eq!(
            validate_image(None, vec![0], MB).unwrap_err(),
            UploadError::UnsupportedType("none".into())
        );
    }

    #[test]
    fn test_rejects_empty_file() {
        assert_eq!(
            validate_image(Some("image/gif"), Vec::new(), MB).unwrap_err(),
            UploadError::Empty
        );
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let limit = 2 * MB;
        let at_limit = vec![0_u8; usize::try_from(limit).unwrap()];
        assert!(validate_image(Some("image/jpeg"), at_limit, limit).is_ok());

        let over = vec![0_u8; usize::try_from(limit).unwrap() + 1];
        assert_eq!(
            validate_image(Some("image/jpeg"), over, limit).unwrap_err(),
            UploadError::TooLarge { max_mb: 2 }
        );
    }
}
