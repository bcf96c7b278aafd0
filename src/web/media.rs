//! Uploaded image storage.
//!
//! Images live under `<media dir>/task_images/` and are referenced from the
//! `tasks.image` column by their path relative to the media directory.
//! Serving them over HTTP is opt-in via [`MediaConfig::serve`].

use anyhow::{Context, Result};
use axum::body::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tower_http::services::ServeDir;
use tracing::{debug, warn};

use crate::config::MediaConfig;
use crate::db::now_ms;

/// Subdirectory of the media root holding task images.
pub const IMAGE_DIR: &str = "task_images";

const MAX_NAME_LEN: usize = 100;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// A file part received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            data: data.into(),
        }
    }

    /// Whether the upload is an image the board can display.
    ///
    /// The declared type or extension must name an image and the content
    /// must start with a known image signature.
    pub fn is_image(&self) -> bool {
        let declared = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
            || extension_of(&self.file_name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
        declared && sniff_image(&self.data).is_some()
    }
}

/// Detect an image format from its leading bytes, returning its extension.
pub fn sniff_image(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("webp")
    } else if data.starts_with(b"BM") && data.len() > 14 {
        Some("bmp")
    } else {
        None
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Reduce a client-supplied file name to a safe single path component.
pub fn sanitize_file_name(name: &str) -> String {
    // Browsers on Windows may send the full client path.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(base.len());
    let mut last_was_sep = false;
    for c in base.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut name: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() {
        name.push_str("image");
    }
    name
}

/// Image storage rooted at the configured media directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url_prefix: String,
    serve: bool,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>, serve: bool) -> Self {
        let url_prefix = url_prefix.into();
        let trimmed = url_prefix.trim_matches('/');
        // Media cannot be mounted at the site root.
        let url_prefix = if trimmed.is_empty() {
            "/media".to_string()
        } else {
            format!("/{}", trimmed)
        };
        Self {
            root: root.into(),
            url_prefix,
            serve,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(&config.dir, &config.url_prefix, config.serve)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Absolute location of a stored image.
    pub fn path_of(&self, image: &str) -> PathBuf {
        self.root.join(image)
    }

    /// Public URL of a stored image.
    pub fn url_of(&self, image: &str) -> String {
        let encoded: Vec<String> = image
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.url_prefix, encoded.join("/"))
    }

    /// Static file service for the media directory, when serving is enabled.
    pub fn service(&self) -> Option<ServeDir> {
        self.serve.then(|| ServeDir::new(&self.root))
    }

    /// Write an upload and return its reference relative to the media root.
    pub async fn save(&self, upload: &Upload) -> Result<String> {
        let dir = self.root.join(IMAGE_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut name = sanitize_file_name(&upload.file_name);
        if extension_of(&name).is_none() {
            if let Some(ext) = sniff_image(&upload.data) {
                name = format!("{}.{}", name, ext);
            }
        }

        let stamp = now_ms();
        let mut file_name = format!("{}-{}", stamp, name);
        let mut attempt = 1;
        // create_new claims the name atomically; concurrent saves move on.
        let (path, mut file) = loop {
            let path = dir.join(&file_name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    file_name = format!("{}-{}-{}", stamp, attempt, name);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()));
                }
            }
        };

        let written = async {
            file.write_all(&upload.data).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e).with_context(|| format!("Failed to write {}", path.display()));
        }

        let image = format!("{}/{}", IMAGE_DIR, file_name);
        debug!(image = %image, bytes = upload.data.len(), "Stored uploaded image");
        Ok(image)
    }

    /// Delete a stored image. Failures are logged, not returned.
    pub async fn remove(&self, image: &str) {
        if image.is_empty() || image.split('/').any(|segment| segment == "..") {
            warn!(image = %image, "Refusing to remove image outside the media directory");
            return;
        }
        let path = self.path_of(image);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(image = %image, "Removed image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove image: {}", e),
        }
    }
}
