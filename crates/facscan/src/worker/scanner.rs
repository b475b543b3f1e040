use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::error::WorkerError;
use crate::worker::job::Job;

/// Lists the PDFs waiting in the input folder.
pub struct DirectoryScanner {
    input_directory: PathBuf,
}

fn is_pending_pdf(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);

    // Hidden files include in-flight compression temporaries
    !hidden
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(input_directory: P) -> Self {
        Self {
            input_directory: input_directory.as_ref().to_path_buf(),
        }
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    /// One job per top-level `.pdf` file, sorted by path. Subdirectories are
    /// not entered.
    pub fn scan(&self) -> Result<Vec<Job>, WorkerError> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(&self.input_directory)
            .min_depth(1)
            .max_depth(1)
        {
            let entry = entry.map_err(|e| WorkerError::ScanFailed {
                path: self.input_directory.clone(),
                source: e,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if is_pending_pdf(path) {
                debug!("Found document: {}", path.display());
                paths.push(path.to_path_buf());
            }
        }

        paths.sort();

        info!(
            "Scanned {} documents in {}",
            paths.len(),
            self.input_directory.display()
        );
        Ok(paths.into_iter().map(Job::new).collect())
    }
}
