use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::sanitize::redact_path;

const MAX_SUFFIX: u32 = 1000;

/// Move a file from `src` to `dst`, replacing `dst` if present. Uses `rename`
/// first and falls back to copy + delete for cross-device moves.
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn candidate_name(base_name: &str, extension: &str, suffix: u32) -> String {
    match suffix {
        0 => format!("{}.{}", base_name, extension),
        n => format!("{}_{}.{}", base_name, n, extension),
    }
}

/// Hands out collision-free file names.
///
/// `reserve` holds the lock from the existence check until an empty
/// placeholder has been created with `create_new`, so two callers asking for
/// the same base name always get different paths (`name.pdf`, `name_1.pdf`).
#[derive(Default)]
pub struct NameReserver {
    lock: Mutex<()>,
}

impl NameReserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the first free `{base_name}[_N].{extension}` in `directory`.
    ///
    /// The returned path exists as an empty placeholder owned by the caller.
    pub fn reserve(
        &self,
        directory: &Path,
        base_name: &str,
        extension: &str,
    ) -> Result<PathBuf, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        ensure_directory(directory)?;

        // A second miss means something outside this process keeps creating
        // the names we pick.
        for attempt in 0..2 {
            let path = first_free_name(directory, base_name, extension)?;
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!(file = %redact_path(&path), "name reserved");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!(attempt, "reserved name was taken concurrently, searching again");
                }
                Err(e) => return Err(StorageError::WriteFile { path, source: e }),
            }
        }

        Err(StorageError::FilesystemRace {
            directory: directory.to_path_buf(),
            base_name: base_name.to_string(),
        })
    }
}

fn first_free_name(
    directory: &Path,
    base_name: &str,
    extension: &str,
) -> Result<PathBuf, StorageError> {
    for suffix in 0..=MAX_SUFFIX {
        let path = directory.join(candidate_name(base_name, extension, suffix));
        // symlink_metadata also sees broken symlinks
        if std::fs::symlink_metadata(&path).is_err() {
            return Ok(path);
        }
    }
    Err(StorageError::FileExists(
        directory.join(candidate_name(base_name, extension, 0)),
    ))
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Final placement of processed documents.
pub struct FileStorage {
    output_directory: PathBuf,
    manual_review_directory: PathBuf,
    reserver: NameReserver,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        output_directory: P,
        manual_review_directory: Q,
    ) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
            manual_review_directory: manual_review_directory.as_ref().to_path_buf(),
            reserver: NameReserver::new(),
        }
    }

    pub fn manual_review_directory(&self) -> &Path {
        &self.manual_review_directory
    }

    /// Moves an identified document to `{output}/{year}/{base_name}[_N].pdf`.
    pub fn file_invoice(
        &self,
        source: &Path,
        year: i32,
        base_name: &str,
    ) -> Result<PathBuf, StorageError> {
        let directory = self.output_directory.join(year.to_string());
        self.place(source, &directory, base_name)
    }

    /// Moves an unidentified document, content untouched, to
    /// `{review}/documento_escaneado_{YYYYMMDD}_{HHMM}[_N].pdf`.
    pub fn send_to_manual_review(
        &self,
        source: &Path,
        now: NaiveDateTime,
    ) -> Result<PathBuf, StorageError> {
        let base_name = format!("documento_escaneado_{}", now.format("%Y%m%d_%H%M"));
        let directory = self.manual_review_directory.clone();
        self.place(source, &directory, &base_name)
    }

    fn place(
        &self,
        source: &Path,
        directory: &Path,
        base_name: &str,
    ) -> Result<PathBuf, StorageError> {
        let target = self.reserver.reserve(directory, base_name, "pdf")?;

        if let Err(e) = move_file(source, &target) {
            let _ = std::fs::remove_file(&target);
            return Err(e);
        }

        Ok(target)
    }
}
