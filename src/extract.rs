//! Plain-text extraction for uploaded course material.
//!
//! PDFs go through `pdf-extract`; everything else must be UTF-8 text.
//! Extraction never panics: malformed input becomes an [`ExtractError`]
//! and the caller skips the file.

use std::path::Path;

use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("file is not valid UTF-8 text: {0}")]
    NotText(String),
}

/// Content type inferred from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => MIME_PDF,
        _ => MIME_TEXT,
    }
}

/// Read `path` and return its text.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_text(&bytes, content_type_for(path))
}

/// Extract text from in-memory content of the given content type.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
        _ => String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::NotText(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for(Path::new("notes/Lecture1.PDF")), MIME_PDF);
        assert_eq!(content_type_for(Path::new("notes/summary.md")), MIME_TEXT);
        assert_eq!(content_type_for(Path::new("README")), MIME_TEXT);
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        let err = extract_text(b"not a pdf at all", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_binary_text_is_error() {
        let err = extract_text(&[0xff, 0xfe, 0x00, 0x9f], MIME_TEXT).unwrap_err();
        assert!(matches!(err, ExtractError::NotText(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = extract_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
