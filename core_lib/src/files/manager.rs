use axum::body::Bytes;
use futures_util::{stream, Stream};
use mime::Mime;
use std::io;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR_STR};
use tokio::{fs::File, io::AsyncReadExt};
use tracing::{debug, warn};

use crate::error::{AppError, Result};

const ACCESS_DENIED: &str = "Access denied";
const FILE_NOT_FOUND: &str = "File not found";

const CHUNK_SIZE: usize = 64 * 1024;

/// An opened file, ready to be streamed to the client.
#[derive(Debug)]
pub struct ServedFile {
    pub path: PathBuf,
    pub content_type: Mime,
    pub len: u64,
    file: File,
}

impl ServedFile {
    /// Reads the file in chunks of at most 64 KiB.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream::try_unfold(self.file, |mut file| async move {
            let mut chunk = vec![0_u8; CHUNK_SIZE];
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                return Ok(None);
            }
            chunk.truncate(read);
            Ok::<_, io::Error>(Some((Bytes::from(chunk), file)))
        })
    }
}

/// Serves files out of a single base directory.
///
/// Names are expected to have passed `validate_file_name` already. The
/// containment checks here run regardless, so a name that slipped past the
/// allow-list still cannot reach outside `base_dir`.
#[derive(Clone, Debug)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    pub fn new(base_dir: impl AsRef<Path>) -> io::Result<Self> {
        let base_dir = base_dir.as_ref();
        let absolute = if base_dir.is_absolute() {
            base_dir.to_path_buf()
        } else {
            std::env::current_dir()?.join(base_dir)
        };

        Ok(Self {
            base_dir: normalize(&absolute),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Joins `name` onto the base directory and normalizes `.`/`..`
    /// lexically. Fails with 403 unless the result lies strictly inside the
    /// base directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let candidate = normalize(&self.base_dir.join(name));

        if !is_within(&self.base_dir, &candidate) {
            warn!(name = %name, "Rejected file request outside the allowed directory");
            return Err(AppError::Forbidden(ACCESS_DENIED.to_string()));
        }

        Ok(candidate)
    }

    /// Opens `name` for streaming after the containment checks. Missing
    /// files and directories are 404.
    pub async fn open(&self, name: &str) -> Result<ServedFile> {
        let path = self.resolve(name)?;

        // Symlinks are only visible after canonicalization.
        let canonical_base = canonicalize_or_not_found(&self.base_dir).await?;
        let canonical = canonicalize_or_not_found(&path).await?;
        if !is_within(&canonical_base, &canonical) {
            warn!(name = %name, "Rejected file request escaping through a link");
            return Err(AppError::Forbidden(ACCESS_DENIED.to_string()));
        }

        let file = match File::open(&canonical).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(FILE_NOT_FOUND.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        // Checked on the open handle so the length matches what gets streamed.
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(AppError::NotFound(FILE_NOT_FOUND.to_string()));
        }

        let content_type = mime_guess::from_path(&path).first_or_octet_stream();
        debug!(path = %path.display(), size = metadata.len(), content_type = %content_type, "Serving file");

        Ok(ServedFile {
            path,
            content_type,
            len: metadata.len(),
            file,
        })
    }
}

async fn canonicalize_or_not_found(path: &Path) -> Result<PathBuf> {
    match tokio::fs::canonicalize(path).await {
        Ok(canonical) => Ok(canonical),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(AppError::NotFound(FILE_NOT_FOUND.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

/// True when `candidate` starts with `base` followed by a separator. The base
/// directory itself is not "within" itself.
fn is_within(base: &Path, candidate: &Path) -> bool {
    let mut prefix = base.to_string_lossy().into_owned();
    if !prefix.ends_with(MAIN_SEPARATOR_STR) {
        prefix.push_str(MAIN_SEPARATOR_STR);
    }

    candidate.to_string_lossy().starts_with(&prefix)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
