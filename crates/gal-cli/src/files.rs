use std::fs;
use std::path::{Path, PathBuf};

use gal_core::GalError;
use gal_runtime::FileAccess;
use walkdir::WalkDir;

/// Script storage on the local filesystem, rooted at the directory of the
/// entry script so `[Jump] >file` and `[Import]` stay relative to it.
pub struct DiskFiles {
    base: PathBuf,
}

impl DiskFiles {
    /// Splits a script path into its storage and the entry file name.
    pub fn for_script(script: &Path) -> (Self, String) {
        let base = script
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let entry = script
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        (Self { base }, entry)
    }
}

impl FileAccess for DiskFiles {
    fn read(&self, path: &str) -> Result<String, GalError> {
        fs::read_to_string(path)
            .map_err(|error| GalError::new("FILE_READ", format!("Cannot read {}: {}", path, error)))
    }

    fn write(&self, path: &str, text: &str) -> Result<(), GalError> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent).map_err(|error| {
                GalError::new(
                    "FILE_WRITE",
                    format!("Cannot create {}: {}", parent.display(), error),
                )
            })?;
        }
        fs::write(path, text).map_err(|error| {
            GalError::new("FILE_WRITE", format!("Cannot write {}: {}", path, error))
        })
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, GalError> {
        let mut out = Vec::new();
        for entry in WalkDir::new(self.base.join(dir)).sort_by_file_name() {
            let entry = entry
                .map_err(|error| GalError::new("FILE_LIST", format!("Cannot list: {}", error)))?;
            if entry.file_type().is_file() {
                out.push(entry.path().display().to_string());
            }
        }
        Ok(out)
    }

    fn resolve(&self, relative: &str) -> Result<String, GalError> {
        Ok(self.base.join(relative).display().to_string())
    }
}
