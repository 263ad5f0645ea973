//! Input acquisition: turn uploaded files into an ordered list of images.
//!
//! Photos are decoded from memory; a PDF is handed to
//! [`crate::pipeline::render`]. File types are decided by extension, the
//! way an upload widget filters them, and image content is sniffed when
//! decoding. Decoding runs on the blocking pool, one task per file, and the
//! upload order is preserved.

use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::pipeline::render;
use crate::prompts::UseCase;
use futures::future::try_join_all;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::Path;
use tracing::{debug, info};

/// One submitted file.
#[derive(Clone)]
pub struct Upload {
    /// Original file name; only its extension matters.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file, mapping missing/unreadable files to input errors.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ReviewError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ReviewError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ReviewError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ReviewError::Decode {
                name: path.display().to_string(),
                detail: e.to_string(),
            },
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Read upload {} ({} bytes)", name, bytes.len());
        Ok(Self { name, bytes })
    }

    /// Classify by extension (case-insensitive).
    pub fn kind(&self) -> Result<FileKind, ReviewError> {
        let ext = Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("jpg") | Some("jpeg") => Ok(FileKind::Jpeg),
            Some("png") => Ok(FileKind::Png),
            Some("pdf") => Ok(FileKind::Pdf),
            _ => Err(ReviewError::UnsupportedFileType {
                name: self.name.clone(),
            }),
        }
    }
}

/// Accepted upload types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Jpeg,
    Png,
    Pdf,
}

impl FileKind {
    pub fn is_image(self) -> bool {
        matches!(self, FileKind::Jpeg | FileKind::Png)
    }
}

/// Where an image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A photo upload; `index` is its 0-based upload position.
    Photo { name: String, index: usize },
    /// A rasterised PDF page; `page` is 1-based.
    PdfPage { name: String, page: usize },
}

/// One decoded or rasterised image.
#[derive(Debug, Clone)]
pub struct MediaImage {
    pub source: MediaSource,
    pub image: DynamicImage,
}

/// The ordered images for one request. Held only for that request.
#[derive(Debug, Clone, Default)]
pub struct UploadedMedia {
    pub images: Vec<MediaImage>,
}

impl UploadedMedia {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Which uploads a use case accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRule {
    pub allow_images: bool,
    pub allow_pdf: bool,
    /// Exact upper bound on files, independent of the configured image cap.
    pub max_files: Option<usize>,
}

/// Input rule for a use case.
pub fn input_rule(use_case: UseCase) -> InputRule {
    match use_case {
        UseCase::ProfileReview | UseCase::RatingOnly => InputRule {
            allow_images: true,
            allow_pdf: true,
            max_files: None,
        },
        UseCase::ReplyGeneration => InputRule {
            allow_images: true,
            allow_pdf: false,
            max_files: Some(1),
        },
        UseCase::ResumeParsing => InputRule {
            allow_images: true,
            allow_pdf: true,
            max_files: Some(1),
        },
        UseCase::InterviewPrep => InputRule {
            allow_images: false,
            allow_pdf: false,
            max_files: Some(0),
        },
    }
}

/// Check the upload set against the use case and the image cap.
///
/// Returns each file's kind in upload order. Runs before any decoding so a
/// rejected request costs nothing.
pub fn validate_uploads(
    uploads: &[Upload],
    use_case: UseCase,
    max_images: Option<usize>,
) -> Result<Vec<FileKind>, ReviewError> {
    if uploads.is_empty() {
        return Err(ReviewError::NoInput);
    }

    let rule = input_rule(use_case);
    if let Some(max) = rule.max_files {
        if uploads.len() > max {
            return Err(ReviewError::InvalidInput {
                reason: match max {
                    0 => format!("{use_case} takes no file uploads"),
                    1 => format!("{use_case} takes exactly one file, got {}", uploads.len()),
                    n => format!("{use_case} takes at most {n} files, got {}", uploads.len()),
                },
            });
        }
    }

    let kinds = uploads
        .iter()
        .map(Upload::kind)
        .collect::<Result<Vec<_>, _>>()?;

    let pdf_count = kinds.iter().filter(|k| **k == FileKind::Pdf).count();
    if pdf_count > 0 {
        if !rule.allow_pdf {
            return Err(ReviewError::InvalidInput {
                reason: format!("{use_case} accepts images only (jpg, jpeg, png)"),
            });
        }
        if uploads.len() > 1 {
            return Err(ReviewError::InvalidInput {
                reason: "a PDF must be uploaded on its own".to_string(),
            });
        }
    } else {
        if !rule.allow_images {
            return Err(ReviewError::InvalidInput {
                reason: format!("{use_case} does not accept images"),
            });
        }
        check_cap(uploads.len(), max_images)?;
    }

    Ok(kinds)
}

fn check_cap(count: usize, max_images: Option<usize>) -> Result<(), ReviewError> {
    match max_images {
        Some(max) if count > max => Err(ReviewError::TooManyImages { count, max }),
        _ => Ok(()),
    }
}

/// Acquire the images for one request.
///
/// Photos are decoded (and downscaled past `max_image_pixels`); a PDF is
/// rasterised according to `pdf_pages`. The image cap is checked before
/// decoding and again after rasterisation.
pub async fn acquire(
    uploads: Vec<Upload>,
    use_case: UseCase,
    config: &ReviewConfig,
) -> Result<UploadedMedia, ReviewError> {
    let kinds = validate_uploads(&uploads, use_case, config.max_images)?;

    if kinds.first() == Some(&FileKind::Pdf) {
        let upload = uploads
            .into_iter()
            .next()
            .ok_or(ReviewError::NoInput)?;
        check_pdf_magic(&upload)?;
        let images = render::render_pdf(upload.bytes, upload.name, config).await?;
        check_cap(images.len(), config.max_images)?;
        info!("Acquired {} page image(s) from PDF", images.len());
        return Ok(UploadedMedia { images });
    }

    let max_px = config.max_image_pixels;
    let tasks = uploads.into_iter().enumerate().map(|(index, upload)| async move {
        tokio::task::spawn_blocking(move || decode_photo(upload, index, max_px))
            .await
            .map_err(|e| ReviewError::Internal(format!("Decode task panicked: {e}")))?
    });
    let images = try_join_all(tasks).await?;

    info!("Acquired {} photo(s)", images.len());
    Ok(UploadedMedia { images })
}

/// Reject files named `.pdf` whose content is not a PDF before pdfium sees them.
fn check_pdf_magic(upload: &Upload) -> Result<(), ReviewError> {
    if upload.bytes.len() < 4 || &upload.bytes[..4] != b"%PDF" {
        return Err(ReviewError::NotAPdf {
            name: upload.name.clone(),
            magic: upload.bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

/// Decode one photo, downscaling it to fit `max_px` on the long edge.
fn decode_photo(upload: Upload, index: usize, max_px: u32) -> Result<MediaImage, ReviewError> {
    let image = image::load_from_memory(&upload.bytes).map_err(|e| ReviewError::Decode {
        name: upload.name.clone(),
        detail: e.to_string(),
    })?;

    let image = if image.width().max(image.height()) > max_px {
        let resized = image.resize(max_px, max_px, FilterType::Triangle);
        debug!(
            "Downscaled {} from {}x{} to {}x{}",
            upload.name,
            image.width(),
            image.height(),
            resized.width(),
            resized.height()
        );
        resized
    } else {
        image
    };

    Ok(MediaImage {
        source: MediaSource::Photo {
            name: upload.name,
            index,
        },
        image,
    })
}
