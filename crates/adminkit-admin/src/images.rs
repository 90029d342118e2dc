//! Per-object image files of a module.
//!
//! Images are stored as `<img_dir>/modules/<module>/<object_id>_<type>.<ext>`
//! and served from `<img_uri>modules/<module>/`. One upload can be written
//! in several output formats; each file is resized to the requested box
//! without ever being enlarged.

use std::fs;
use std::path::{Path, PathBuf};

use adminkit_core::{AdminKitError, AdminKitResult, Settings};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

/// Extensions accepted when none are configured.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// MIME types accepted when none are configured.
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Transfer status reported with an upload, numbered like the usual
/// multipart upload error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// 0: the file arrived.
    Ok,
    /// 1: larger than the server limit.
    IniSize,
    /// 2: larger than the form limit.
    FormSize,
    /// 3: truncated.
    Partial,
    /// 4: no file sent.
    NoFile,
    /// 6: no temporary directory.
    NoTmpDir,
    /// 7: could not be written.
    CantWrite,
    /// 8: stopped by a server extension.
    Extension,
    /// Any other code.
    Unknown(i32),
}

impl UploadStatus {
    /// Maps a numeric upload code.
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::IniSize,
            2 => Self::FormSize,
            3 => Self::Partial,
            4 => Self::NoFile,
            6 => Self::NoTmpDir,
            7 => Self::CantWrite,
            8 => Self::Extension,
            other => Self::Unknown(other),
        }
    }

    /// The error message for a failed upload, `None` for [`Ok`](Self::Ok).
    pub const fn message(self) -> Option<&'static str> {
        match self {
            Self::Ok => None,
            Self::IniSize | Self::FormSize => {
                Some("The uploaded file exceeds the maximum allowed size")
            }
            Self::Partial => Some("The file was only partially uploaded"),
            Self::NoFile => Some("No file was uploaded"),
            Self::NoTmpDir => Some("Missing a temporary folder"),
            Self::CantWrite => Some("Failed to write file to disk"),
            Self::Extension => Some("A server extension stopped the file upload"),
            Self::Unknown(_) => Some("Unknown upload error"),
        }
    }
}

/// An uploaded file as received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-side file name.
    pub name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Transfer status.
    pub status: UploadStatus,
    /// File content.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// A successfully transferred file.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            status: UploadStatus::Ok,
            bytes,
        }
    }

    /// Sets the transfer status.
    #[must_use]
    pub const fn with_status(mut self, status: UploadStatus) -> Self {
        self.status = status;
        self
    }

    /// Lowercased extension of the client-side name.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// Stores image files for the objects of one module.
#[derive(Debug, Clone)]
pub struct ImageManager {
    module: String,
    img_dir: PathBuf,
    img_uri: String,
    allowed_extensions: Vec<String>,
    allowed_mime_types: Vec<String>,
}

impl ImageManager {
    /// Creates a manager with the default allow lists.
    pub fn new(module: impl Into<String>, img_dir: impl Into<PathBuf>, img_uri: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            img_dir: img_dir.into(),
            img_uri: img_uri.into(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Creates a manager on the image locations of the settings.
    pub fn from_settings(module: impl Into<String>, settings: &Settings) -> Self {
        Self::new(module, settings.images.img_dir.clone(), settings.images.img_uri.clone())
    }

    /// Replaces the allow lists.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` when either list is empty.
    pub fn with_allowed<E, M>(mut self, extensions: E, mime_types: M) -> AdminKitResult<Self>
    where
        E: IntoIterator,
        E::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        self.allowed_extensions = extensions.into_iter().map(Into::into).collect();
        self.allowed_mime_types = mime_types.into_iter().map(Into::into).collect();
        if self.allowed_extensions.is_empty() {
            return Err(AdminKitError::ImproperlyConfigured(
                "Allowed extensions list cannot be empty".to_string(),
            ));
        }
        if self.allowed_mime_types.is_empty() {
            return Err(AdminKitError::ImproperlyConfigured(
                "Allowed MIME types list cannot be empty".to_string(),
            ));
        }
        Ok(self)
    }

    /// The module name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Directory holding the module's images.
    pub fn destination_dir(&self) -> PathBuf {
        self.img_dir.join("modules").join(&self.module)
    }

    /// Base URI of the module's images, with a trailing slash.
    pub fn destination_uri(&self) -> String {
        format!("{}modules/{}/", self.img_uri, self.module)
    }

    /// Validates `upload` and writes it once per output extension.
    ///
    /// A missing upload, or one without a file name, is ignored. With only
    /// `width` or `height` the other side keeps the aspect ratio; a box
    /// larger than the source is shrunk to the source size.
    ///
    /// # Errors
    ///
    /// Returns `ImageError` when the upload failed, its extension or type is
    /// not allowed, it does not decode as an image, an output extension is
    /// not allowed, or a file cannot be written.
    pub fn save_image(
        &self,
        upload: Option<&UploadedFile>,
        object_id: i64,
        image_type: &str,
        extensions: &[&str],
        width: Option<u32>,
        height: Option<u32>,
    ) -> AdminKitResult<()> {
        let Some(upload) = upload.filter(|u| !u.name.is_empty()) else {
            return Ok(());
        };

        let source = self.validate_upload(upload)?;
        self.ensure_destination_dir()?;

        let (source_width, source_height) = source.dimensions();
        let (width, height) = fit_dimensions(source_width, source_height, width, height);
        let resized = match (width, height) {
            (Some(w), Some(h)) if (w, h) != (source_width, source_height) => {
                source.resize_exact(w.max(1), h.max(1), FilterType::Lanczos3)
            }
            _ => source,
        };

        for extension in extensions {
            if !self.allowed_extensions.iter().any(|e| e.as_str() == *extension) {
                return Err(AdminKitError::ImageError(format!(
                    "Invalid output extension: {extension}"
                )));
            }
            let path = self.destination_dir().join(file_name(object_id, image_type, extension));
            write_image(&resized, &path, extension)?;
            tracing::debug!(module = %self.module, path = %path.display(), "image written");
        }

        tracing::info!(module = %self.module, object_id, image_type, formats = extensions.len(), "image saved");
        Ok(())
    }

    /// Removes every `<object_id>_<type>.*` file. Returns how many were
    /// removed.
    pub fn delete_image(&self, object_id: i64, image_type: &str) -> AdminKitResult<usize> {
        let prefix = format!("{object_id}_{image_type}.");
        let entries = match fs::read_dir(self.destination_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) && entry.path().is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        tracing::debug!(module = %self.module, object_id, image_type, removed, "images deleted");
        Ok(removed)
    }

    /// An `<img>` tag for the stored file, or an empty string when it does
    /// not exist.
    pub fn thumbnail_html(&self, object_id: i64, image_type: &str, extension: &str, max_width: &str) -> String {
        let name = file_name(object_id, image_type, extension);
        if !self.destination_dir().join(&name).is_file() {
            return String::new();
        }
        format!(
            r#"<img src="{}{name}" style="max-width: {max_width}; margin: 10px 0;" />"#,
            self.destination_uri()
        )
    }

    fn validate_upload(&self, upload: &UploadedFile) -> AdminKitResult<DynamicImage> {
        if let Some(message) = upload.status.message() {
            return Err(AdminKitError::ImageError(message.to_string()));
        }

        if !self.allowed_extensions.contains(&upload.extension()) {
            return Err(AdminKitError::ImageError(format!(
                "Invalid file extension. Allowed extensions: {}",
                self.allowed_extensions.join(", ")
            )));
        }

        let sniffed = image::guess_format(&upload.bytes).ok().map(|f| f.to_mime_type());
        let declared_ok = self.allowed_mime_types.iter().any(|m| *m == upload.content_type);
        let sniffed_ok = sniffed.is_some_and(|s| self.allowed_mime_types.iter().any(|m| m == s));
        if !declared_ok || !sniffed_ok {
            return Err(AdminKitError::ImageError(format!(
                "Invalid file type. Allowed types: {}",
                self.allowed_mime_types.join(", ")
            )));
        }

        image::load_from_memory(&upload.bytes).map_err(|e| {
            tracing::warn!(module = %self.module, error = %e, "undecodable upload");
            AdminKitError::ImageError("The uploaded file is not a valid image".to_string())
        })
    }

    fn ensure_destination_dir(&self) -> AdminKitResult<()> {
        let dir = self.destination_dir();
        fs::create_dir_all(&dir).map_err(|e| {
            AdminKitError::ImageError(format!("Unable to create image directory: {e}"))
        })?;
        if fs::metadata(&dir)?.permissions().readonly() {
            return Err(AdminKitError::ImageError(
                "Image directory is not writable".to_string(),
            ));
        }
        Ok(())
    }
}

fn file_name(object_id: i64, image_type: &str, extension: &str) -> String {
    format!("{object_id}_{image_type}.{extension}")
}

fn write_image(image: &DynamicImage, path: &Path, extension: &str) -> AdminKitResult<()> {
    let format = ImageFormat::from_extension(extension).ok_or_else(|| {
        AdminKitError::ImageError(format!("Unsupported output format: {extension}"))
    })?;
    let result = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(path, format)
    } else {
        DynamicImage::ImageRgba8(image.to_rgba8()).save_with_format(path, format)
    };
    result.map_err(|e| {
        AdminKitError::ImageError(format!("An error occurred while uploading the image: {e}"))
    })
}

/// Completes and clamps a target box against the source size.
///
/// A single side gets its partner proportionally; a side larger than the
/// source is reduced to the source and its partner recomputed.
pub fn fit_dimensions(
    source_width: u32,
    source_height: u32,
    width: Option<u32>,
    height: Option<u32>,
) -> (Option<u32>, Option<u32>) {
    let (mut width, mut height) = match (width, height) {
        (Some(w), None) => (Some(w), Some(proportional(w, source_height, source_width))),
        (None, Some(h)) => (Some(proportional(h, source_width, source_height)), Some(h)),
        other => other,
    };

    if width.is_some_and(|w| source_width < w) {
        width = Some(source_width);
        if height.is_some() {
            height = Some(proportional(source_width, source_height, source_width));
        }
    }
    if height.is_some_and(|h| source_height < h) {
        height = Some(source_height);
        if width.is_some() {
            width = Some(proportional(source_height, source_width, source_height));
        }
    }
    (width, height)
}

/// `round(side * numerator / denominator)`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn proportional(side: u32, numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return side;
    }
    (f64::from(side) * (f64::from(numerator) / f64::from(denominator))).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_status_messages() {
        assert_eq!(UploadStatus::from_code(0).message(), None);
        assert_eq!(
            UploadStatus::from_code(2).message(),
            Some("The uploaded file exceeds the maximum allowed size")
        );
        assert_eq!(UploadStatus::from_code(4).message(), Some("No file was uploaded"));
        assert_eq!(UploadStatus::from_code(42), UploadStatus::Unknown(42));
        assert_eq!(UploadStatus::from_code(42).message(), Some("Unknown upload error"));
    }

    #[test]
    fn test_destinations() {
        let manager = ImageManager::new("homeslider", "/var/img", "/img/");
        assert_eq!(manager.destination_dir(), PathBuf::from("/var/img/modules/homeslider"));
        assert_eq!(manager.destination_uri(), "/img/modules/homeslider/");
    }

    #[test]
    fn test_empty_allow_lists_rejected() {
        let manager = ImageManager::new("m", "img", "/img/");
        let err = manager
            .clone()
            .with_allowed(Vec::<String>::new(), ["image/png"])
            .unwrap_err();
        assert!(matches!(err, AdminKitError::ImproperlyConfigured(_)));
        assert!(manager.with_allowed(["png"], Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_upload_extension() {
        let upload = UploadedFile::new("Photo.JPG", "image/jpeg", vec![]);
        assert_eq!(upload.extension(), "jpg");
        assert_eq!(UploadedFile::new("noext", "", vec![]).extension(), "");
    }

    #[test]
    fn test_fit_dimensions_proportional() {
        assert_eq!(fit_dimensions(400, 200, Some(100), None), (Some(100), Some(50)));
        assert_eq!(fit_dimensions(400, 200, None, Some(50)), (Some(100), Some(50)));
        assert_eq!(fit_dimensions(3, 2, Some(2), None), (Some(2), Some(1)));
    }

    #[test]
    fn test_fit_dimensions_no_upscaling() {
        assert_eq!(fit_dimensions(400, 200, Some(800), None), (Some(400), Some(200)));
        assert_eq!(fit_dimensions(400, 200, Some(300), Some(500)), (Some(400), Some(200)));
        assert_eq!(fit_dimensions(400, 200, None, None), (None, None));
    }

    #[test]
    fn test_missing_upload_is_noop() {
        let dir = std::env::temp_dir().join("adminkit-images-noop");
        let manager = ImageManager::new("m", &dir, "/img/");
        manager.save_image(None, 1, "main", &["png"], None, None).unwrap();
        let unnamed = UploadedFile::new("", "image/png", vec![1, 2, 3]);
        manager
            .save_image(Some(&unnamed), 1, "main", &["png"], None, None)
            .unwrap();
        assert!(!manager.destination_dir().exists());
    }
}
