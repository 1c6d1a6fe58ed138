use std::path::PathBuf;

use thiserror::Error;
use tokio::fs;
use tokio::task;
use tracing::info;

/// Uploaded pictures are scaled down to fit this square (aspect preserved).
const THUMBNAIL_SIZE: u32 = 125;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported image type '{0}' (allowed: jpg, jpeg, png, bmp)")]
    UnsupportedType(String),

    #[error("Failed to process image: {0}")]
    Process(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing task panicked")]
    TaskPanicked,
}

/// Stores profile pictures under the uploads directory. Files get a
/// randomized name so uploads never collide or overwrite each other.
pub struct ProfileImageService {
    uploads_path: PathBuf,
}

impl ProfileImageService {
    #[must_use]
    pub fn new(uploads_path: impl Into<PathBuf>) -> Self {
        Self {
            uploads_path: uploads_path.into(),
        }
    }

    /// Decode, downscale to fit 125x125 and persist an uploaded picture.
    /// Returns the stored filename.
    pub async fn save_picture(
        &self,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ImageError> {
        let ext = allowed_extension(original_name)
            .ok_or_else(|| ImageError::UnsupportedType(original_name.to_string()))?;

        let filename = format!("{}.{ext}", random_basename());

        fs::create_dir_all(&self.uploads_path).await?;
        let path = self.uploads_path.join(&filename);

        // Decoding and resizing are CPU-bound; keep them off the runtime
        let stored_path = path.clone();
        task::spawn_blocking(move || -> Result<(), ImageError> {
            let picture = image::load_from_memory(&bytes)?;
            let thumbnail = picture.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
            thumbnail.save(&stored_path)?;
            Ok(())
        })
        .await
        .map_err(|_| ImageError::TaskPanicked)??;

        info!(file = %path.display(), "Stored profile picture");

        Ok(filename)
    }
}

/// Map an uploaded filename to a canonical stored extension.
fn allowed_extension(filename: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(filename).extension()?.to_str()?;

    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "bmp" => Some("bmp"),
        _ => None,
    }
}

/// Random 16-character hex basename
fn random_basename() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();

    bytes.iter().fold(String::with_capacity(16), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("me.jpg"), Some("jpg"));
        assert_eq!(allowed_extension("me.JPEG"), Some("jpg"));
        assert_eq!(allowed_extension("avatar.png"), Some("png"));
        assert_eq!(allowed_extension("old.bmp"), Some("bmp"));
        assert_eq!(allowed_extension("animation.gif"), None);
        assert_eq!(allowed_extension("script.sh"), None);
        assert_eq!(allowed_extension("no_extension"), None);
    }

    #[test]
    fn test_random_basename_shape() {
        let a = random_basename();
        let b = random_basename();

        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
