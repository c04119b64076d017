//! On-disk book library: uploaded source documents and their text.
//!
//! Only plain-text formats are read here. PDF extraction is an external concern,
//! so PDF uploads are refused with `UnsupportedFile`.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, instrument, warn};

use crate::error::{AppError, Result};
use crate::util::sanitize_filename;

pub const ALLOWED_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Clone, Debug)]
pub struct BookLibrary {
  root: PathBuf,
}

impl BookLibrary {
  /// Open the library at `root`, creating the directory if needed.
  pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
    let root = root.into();
    fs::create_dir_all(&root).await?;
    info!(target: "library", root = %root.display(), "Book library ready");
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// File names with an accepted extension, sorted.
  #[instrument(level = "debug", skip(self))]
  pub async fn list(&self) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      if !entry.file_type().await?.is_file() {
        continue;
      }
      if let Some(name) = entry.file_name().to_str() {
        if extension_of(name).is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.as_str())) {
          names.push(name.to_string());
        }
      }
    }
    names.sort();
    Ok(names)
  }

  /// Store an upload under its sanitised name, replacing any book of the same name.
  #[instrument(level = "info", skip(self, data), fields(bytes = data.len()))]
  pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<String> {
    let name = sanitize_filename(original_name);
    if name.is_empty() {
      return Err(AppError::BadRequest("No selected file".into()));
    }
    check_extension(&name)?;
    if data.is_empty() {
      return Err(AppError::BadRequest(format!("Uploaded file '{}' is empty", name)));
    }

    fs::write(self.root.join(&name), data).await?;
    info!(target: "library", %name, bytes = data.len(), "Saved book");
    Ok(name)
  }

  /// Full text of a stored book.
  #[instrument(level = "info", skip(self))]
  pub async fn read_text(&self, name: &str) -> Result<String> {
    if name.is_empty() || sanitize_filename(name) != name {
      return Err(AppError::BadRequest(format!("Invalid book name '{}'", name)));
    }
    check_extension(name)?;

    let path = self.root.join(name);
    let bytes = match fs::read(&path).await {
      Ok(b) => b,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(AppError::NotFound(format!("Selected book '{}' not found.", name)));
      }
      Err(e) => return Err(e.into()),
    };

    let text = String::from_utf8_lossy(&bytes).into_owned();
    if text.trim().is_empty() {
      warn!(target: "library", %name, "Book has no text");
      return Err(AppError::Extraction(format!(
        "Extracted text from {} is empty. The document might be image-based or scanned.",
        name
      )));
    }
    info!(target: "library", %name, chars = text.chars().count(), "Read book text");
    Ok(text)
  }
}

fn extension_of(name: &str) -> Option<String> {
  Path::new(name).extension().and_then(|e| e.to_str()).map(str::to_lowercase)
}

fn check_extension(name: &str) -> Result<()> {
  match extension_of(name) {
    Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
    Some(ext) => Err(AppError::UnsupportedFile(format!(".{} (accepted: txt, md)", ext))),
    None => Err(AppError::UnsupportedFile("file has no extension".into())),
  }
}
