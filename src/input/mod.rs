//! Image and saved-response input.
//!
//! This module validates the photo to upload (extension, size, real image
//! format) and reads previously saved classifier responses from disk.

use crate::models::{ClassificationMap, ImageInfo};
use anyhow::{bail, Context, Result};
use image::ImageReader;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for image input validation.
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Accepted file extensions, lower-case without dot.
    pub extensions: Vec<String>,
    /// Maximum file size in bytes.
    pub max_file_size: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg", "jpeg", "png", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

impl From<&crate::config::InputSettings> for InputConfig {
    fn from(settings: &crate::config::InputSettings) -> Self {
        Self {
            extensions: settings
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            max_file_size: settings.max_file_size,
        }
    }
}

/// An image ready to be uploaded.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Path the image was read from.
    pub path: PathBuf,
    /// File name sent with the upload.
    pub file_name: String,
    /// MIME type of the detected format.
    pub mime_type: &'static str,
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// Format, dimensions and size.
    pub info: ImageInfo,
}

/// Loader for plant photos.
pub struct ImageLoader {
    config: InputConfig,
}

impl ImageLoader {
    /// Create a new image loader.
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    /// Read and validate an image file.
    pub fn load(&self, path: &Path) -> Result<ImageInput> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Cannot access image: {}", path.display()))?;

        if !metadata.is_file() {
            bail!("Not a file: {}", path.display());
        }

        if !self.has_accepted_extension(path) {
            bail!(
                "Unsupported image type: {} (accepted: {})",
                path.display(),
                self.config.extensions.join(", ")
            );
        }

        if metadata.len() == 0 {
            bail!("Image file is empty: {}", path.display());
        }

        if metadata.len() > self.config.max_file_size {
            bail!(
                "Image is too large: {} bytes (limit {} bytes)",
                metadata.len(),
                self.config.max_file_size
            );
        }

        let bytes =
            fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))?;

        let reader = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .context("Failed to inspect image data")?;
        let format = reader
            .format()
            .with_context(|| format!("Unrecognized image data in {}", path.display()))?;
        let (width, height) = reader
            .into_dimensions()
            .with_context(|| format!("Failed to decode image header: {}", path.display()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());

        debug!(
            "Loaded {} ({:?}, {}x{}, {} bytes)",
            file_name,
            format,
            width,
            height,
            bytes.len()
        );

        Ok(ImageInput {
            path: path.to_path_buf(),
            mime_type: format.to_mime_type(),
            info: ImageInfo {
                file_name: file_name.clone(),
                format: format!("{:?}", format).to_uppercase(),
                width,
                height,
                size_bytes: metadata.len(),
            },
            file_name,
            bytes,
        })
    }

    fn has_accepted_extension(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        self.config.extensions.contains(&ext)
    }
}

/// Load a saved classifier response.
///
/// Keys keep the order they have in the file.
pub fn load_results(path: &Path) -> Result<ClassificationMap> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;

    let map: ClassificationMap = serde_json::from_str(&content).with_context(|| {
        format!(
            "Results file is not a JSON object of label → probability: {}",
            path.display()
        )
    })?;

    debug!("Loaded {} labels from {}", map.len(), path.display());
    Ok(map)
}
