use crate::config::UploadConfig;
use crate::content::FileType;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];
const GIF_TYPES: &[&str] = &["image/gif"];
const VIDEO_TYPES: &[&str] = &["video/mp4", "video/webm", "video/quicktime"];
const PDF_TYPES: &[&str] = &["application/pdf"];
const AVATAR_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
const ANY_TYPE: &[&str] = &[];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("uploaded file is empty")]
    Empty,

    #[error("file is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("unsupported file type '{mime}'")]
    UnsupportedType { mime: String },

    #[error("file is not a readable image: {0}")]
    InvalidImage(String),
}

/// Size and type limits for one kind of upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: usize,
    /// Longest edge after downscaling, for formats that get resized.
    pub max_dimension: Option<u32>,
    /// Accepted MIME types. Empty accepts anything.
    pub allowed: &'static [&'static str],
}

impl UploadPolicy {
    pub fn check(&self, mime: &str, size: usize) -> Result<(), UploadError> {
        if size == 0 {
            return Err(UploadError::Empty);
        }
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        let mime = mime.to_ascii_lowercase();
        if !self.allowed.is_empty() && !self.allowed.contains(&mime.as_str()) {
            return Err(UploadError::UnsupportedType { mime });
        }
        Ok(())
    }
}

pub fn avatar_policy(config: &UploadConfig) -> UploadPolicy {
    UploadPolicy {
        max_bytes: config.avatar_max_bytes,
        max_dimension: Some(config.avatar_max_dimension),
        allowed: AVATAR_TYPES,
    }
}

/// Interactive items are links, never uploads, so they have no policy.
pub fn media_policy(file_type: FileType, config: &UploadConfig) -> Option<UploadPolicy> {
    let (allowed, max_dimension) = match file_type {
        FileType::Image => (IMAGE_TYPES, Some(config.media_max_dimension)),
        FileType::Gif => (GIF_TYPES, None),
        FileType::Video => (VIDEO_TYPES, None),
        FileType::Pdf => (PDF_TYPES, None),
        FileType::Other => (ANY_TYPE, None),
        FileType::Interactive => return None,
    };
    Some(UploadPolicy {
        max_bytes: config.media_max_bytes,
        max_dimension,
        allowed,
    })
}

/// File extension for a stored object: from the MIME type, else the client's file name.
pub fn extension_for(mime: &str, file_name: Option<&str>) -> String {
    let from_mime = match mime.to_ascii_lowercase().as_str() {
        "image/jpeg" => Some("jpg"),
        "video/quicktime" => Some("mov"),
        other => mime_guess::get_mime_extensions_str(other).and_then(|exts| exts.first().copied()),
    };

    from_mime
        .map(str::to_string)
        .or_else(|| {
            file_name
                .and_then(|name| std::path::Path::new(name).extension())
                .and_then(|ext| ext.to_str())
                .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .map(str::to_ascii_lowercase)
        })
        .unwrap_or_default()
}
