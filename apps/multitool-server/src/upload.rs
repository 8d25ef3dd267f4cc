//! Multipart form parsing and upload/output file naming

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use multitool_core::validation::{get_safe_filename, is_allowed_extension, secure_filename};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;

/// A file part of a multipart request
#[derive(Debug)]
pub struct UploadedFile {
    /// Name as sent by the client, not yet sanitised
    pub filename: String,
    pub data: Bytes,
}

/// Fully buffered multipart form: file parts grouped by field name, text
/// parts by name (last value wins).
#[derive(Debug, Default)]
pub struct UploadForm {
    files: HashMap<String, Vec<UploadedFile>>,
    fields: HashMap<String, String>,
}

fn malformed(err: MultipartError) -> ApiError {
    ApiError::Validation(format!("Invalid multipart body: {}", err.body_text()))
}

impl UploadForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match field.file_name().map(str::to_owned) {
                Some(filename) => {
                    let data = field.bytes().await.map_err(malformed)?;
                    debug!("Field {}: {} ({} bytes)", name, filename, data.len());
                    form.files
                        .entry(name)
                        .or_default()
                        .push(UploadedFile { filename, data });
                }
                None => {
                    let value = field.text().await.map_err(malformed)?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Text value, treating an empty string as absent
    pub fn value(&self, name: &str) -> Option<&str> {
        self.text(name).filter(|v| !v.is_empty())
    }

    /// `true` iff the value is "true" in any case; `default` when absent.
    pub fn flag(&self, name: &str, default: bool) -> bool {
        self.text(name)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    /// Parse a numeric field, falling back to `default` when it is absent.
    pub fn parse_or<T: FromStr>(&self, name: &str, default: T, message: &str) -> Result<T, ApiError> {
        match self.text(name) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ApiError::Validation(message.to_string())),
        }
    }

    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// First file under `name` that carries a filename.
    pub fn file(&self, name: &str) -> Result<&UploadedFile, ApiError> {
        self.files(name)
            .first()
            .filter(|f| !f.filename.is_empty())
            .ok_or_else(|| ApiError::Validation("No file provided".into()))
    }

    /// Like [`UploadForm::file`], additionally enforcing an extension
    /// allow-list.
    pub fn file_with_extension(&self, name: &str, allowed: &[&str]) -> Result<&UploadedFile, ApiError> {
        let file = self.file(name)?;
        check_extension(file, allowed)?;
        Ok(file)
    }
}

pub fn check_extension(file: &UploadedFile, allowed: &[&str]) -> Result<(), ApiError> {
    if file.filename.is_empty() {
        return Err(ApiError::Validation("No file provided".into()));
    }
    if !is_allowed_extension(&file.filename, allowed) {
        return Err(ApiError::Validation(format!(
            "Invalid file type. Allowed: {}",
            allowed.join(", ")
        )));
    }
    Ok(())
}

/// An uploaded input on disk. The file is deleted when the guard drops,
/// whatever the outcome of processing.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove upload {}: {}", self.path.display(), e);
        }
    }
}

/// Stored name for an upload: `<prefix>_<uuid>_<secured client name>`.
pub fn upload_name(prefix: &str, client_name: &str) -> String {
    get_safe_filename(&format!(
        "{}_{}_{}",
        prefix,
        Uuid::new_v4(),
        secure_filename(client_name)
    ))
}

pub async fn save_upload(dir: &Path, file: &UploadedFile, prefix: &str) -> Result<TempUpload, ApiError> {
    let path = dir.join(upload_name(prefix, &file.filename));
    tokio::fs::write(&path, &file.data)
        .await
        .with_context(|| format!("Failed to store upload {}", path.display()))?;
    debug!("Stored upload at {}", path.display());
    Ok(TempUpload { path })
}

/// Output location `<stem>_<suffix>_<uuid><ext>` in `output_dir`. `ext`
/// includes the dot; `None` keeps the input's extension.
pub fn output_path(output_dir: &Path, input: &Path, suffix: &str, ext: Option<&str>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = match ext {
        Some(ext) => ext.to_string(),
        None => input
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
    };
    output_dir.join(format!("{}_{}_{}{}", stem, suffix, Uuid::new_v4(), ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn uploaded(name: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            data: Bytes::from_static(b"data"),
        }
    }

    #[test]
    fn test_output_path_keeps_input_extension() {
        let out = output_path(
            Path::new("/srv/out"),
            Path::new("/srv/up/resize_input_x_photo.png"),
            "resized",
            None,
        );
        let name = out.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("resize_input_x_photo_resized_"));
        assert!(name.ends_with(".png"));
        assert_eq!(out.parent(), Some(Path::new("/srv/out")));
    }

    #[test]
    fn test_output_path_overrides_extension() {
        let out = output_path(Path::new("out"), Path::new("up/a.jpeg"), "no_bg", Some(".png"));
        assert_eq!(out.extension().unwrap(), "png");
    }

    #[test]
    fn test_extension_check_message() {
        let err = check_extension(&uploaded("notes.txt"), &["pdf"]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid file type. Allowed: pdf");
        assert!(check_extension(&uploaded("A.PDF"), &["pdf"]).is_ok());
        assert_eq!(
            check_extension(&uploaded(""), &["pdf"]).unwrap_err().to_string(),
            "No file provided"
        );
    }

    #[test]
    fn test_temp_upload_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"x").unwrap();

        drop(TempUpload { path: path.clone() });
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_save_upload_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let upload = save_upload(dir.path(), &uploaded("../../My Photo.png"), "crop_input")
            .await
            .unwrap();

        let name = upload.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("crop_input_"));
        assert!(name.ends_with("_My_Photo.png"));
        assert_eq!(upload.path().parent(), Some(dir.path()));
        assert_eq!(std::fs::read(upload.path()).unwrap(), b"data");
    }

    proptest! {
        #[test]
        fn upload_name_stays_in_directory(client in ".{0,48}") {
            let name = upload_name("split_input", &client);
            prop_assert!(name.starts_with("split_input_"));
            prop_assert!(!name.contains('/'));
            prop_assert!(!name.contains('\\'));
        }
    }
}
