//! Local storage for uploaded post images.
//!
//! Files live under `<root>/posts/` and are served back below the public URL
//! prefix. The stored path relative to the root (`posts/<name>`) is what gets
//! persisted with the post.

use image::ImageFormat;
use rand::{Rng, distr::Alphanumeric};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};
use yatube_common::model::post::POST_IMAGE_DIR;

const SUFFIX_LEN: usize = 7;
const MAX_STEM_LEN: usize = 80;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("The upload is not a supported image")]
    NotAnImage,
    #[error("Storing the upload failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        let trimmed = url_prefix.trim_end_matches('/');
        let url_prefix = if trimmed.is_empty() {
            "/media".to_owned()
        } else if trimmed.starts_with('/') {
            trimmed.to_owned()
        } else {
            format!("/{trimmed}")
        };

        Self {
            root: root.into(),
            url_prefix,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Public URL of a stored file.
    #[must_use]
    pub fn url(&self, stored_path: &str) -> String {
        format!("{}/{stored_path}", self.url_prefix)
    }

    /// Validates and stores a post image, returning its path relative to the root.
    ///
    /// A file of the same name gets a random suffix instead of being replaced.
    pub async fn save_post_image(
        &self,
        file_name: Option<&str>,
        data: &[u8],
    ) -> Result<String, MediaError> {
        let format = image::guess_format(data).map_err(|_| MediaError::NotAnImage)?;
        let extension = extension_for(format).ok_or(MediaError::NotAnImage)?;

        let dir = self.root.join(POST_IMAGE_DIR);
        fs::create_dir_all(&dir).await?;

        let stem = file_name.map(sanitized_stem).unwrap_or_default();
        let stem = if stem.is_empty() { "image".to_owned() } else { stem };

        let mut name = format!("{stem}.{extension}");
        loop {
            let path = dir.join(&name);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    let written = async {
                        file.write_all(data).await?;
                        file.flush().await
                    }
                    .await;
                    if let Err(err) = written {
                        drop(file);
                        remove_file(&path).await;
                        return Err(err.into());
                    }
                    break;
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    name = format!("{stem}_{}.{extension}", random_suffix());
                }
                Err(err) => return Err(err.into()),
            }
        }

        let stored_path = format!("{POST_IMAGE_DIR}/{name}");
        info!(%stored_path, "Stored post image");
        Ok(stored_path)
    }

    /// Removes a stored file that ended up unused.
    pub async fn delete(&self, stored_path: &str) {
        remove_file(&self.root.join(stored_path)).await;
    }
}

async fn remove_file(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "Removed media file"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "Could not remove media file"),
    }
}

fn extension_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Gif => Some("gif"),
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Bmp => Some("bmp"),
        _ => None,
    }
}

/// File name without directories or extension, reduced to safe characters.
fn sanitized_stem(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);

    stem.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(MAX_STEM_LEN)
        .collect()
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect()
}
