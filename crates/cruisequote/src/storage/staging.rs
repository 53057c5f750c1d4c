use std::fs::{DirBuilder, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::StorageError;

const COPY_BUFFER: usize = 64 * 1024;

/// Where an upload landed and what it contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the bytes written.
    pub digest: String,
    pub byte_count: u64,
}

/// Writes uploads under a single directory as
/// `<base>_<yyyymmddhhmmss>_<random><ext>`.
#[derive(Debug, Clone)]
pub struct FileStaging {
    upload_directory: PathBuf,
}

impl FileStaging {
    pub fn new<P: AsRef<Path>>(upload_directory: P) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    /// Streams `content` to a new file, hashing in the same pass. The file
    /// is opened with `create_new`, and removed again if any write fails.
    pub fn stage<R: Read>(&self, name: &str, mut content: R) -> Result<StagedFile, StorageError> {
        let (base, extension) = split_name(name)?;
        self.ensure_directory()?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let filename = format!(
            "{}_{}_{}{}",
            base,
            Utc::now().format("%Y%m%d%H%M%S"),
            &suffix[..8],
            extension
        );
        let path = self.upload_directory.join(filename);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        match copy_hashing(&mut content, &mut file) {
            Ok((digest, byte_count)) => {
                tracing::debug!(
                    file = %crate::sanitize::redact_path(&path),
                    bytes = byte_count,
                    "upload staged"
                );
                Ok(StagedFile {
                    path,
                    digest,
                    byte_count,
                })
            }
            Err(e) => {
                drop(file);
                if let Err(rm) = std::fs::remove_file(&path) {
                    tracing::warn!(error = %rm, "failed to remove partial upload");
                }
                Err(StorageError::WriteFile { path, source: e })
            }
        }
    }

    fn ensure_directory(&self) -> Result<(), StorageError> {
        if self.upload_directory.is_dir() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder
            .create(&self.upload_directory)
            .map_err(|e| StorageError::CreateDirectory {
                path: self.upload_directory.clone(),
                source: e,
            })
    }
}

fn copy_hashing<R: Read>(reader: &mut R, file: &mut File) -> std::io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_BUFFER];
    let mut total: u64 = 0;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
        file.write_all(&buffer[..n])?;
        total += n as u64;
    }
    file.flush()?;

    Ok((format!("{:x}", hasher.finalize()), total))
}

/// Splits an uploaded name into a filesystem-safe base and its extension
/// (with the leading dot). Directory components are discarded.
fn split_name(name: &str) -> Result<(String, String), StorageError> {
    let file_name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidName(name.to_string()))?;

    let (stem, extension) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => (&file_name[..dot], &file_name[dot..]),
        _ => (file_name, ""),
    };

    let base: String = stem
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let base = base.trim();
    if base.is_empty() {
        return Err(StorageError::InvalidName(name.to_string()));
    }

    Ok((base.to_string(), extension.to_string()))
}
