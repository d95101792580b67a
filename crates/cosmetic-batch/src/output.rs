//! Output file naming.
//!
//! ```text
//! {output_dir | source_dir}/{prefix}{basename}{_NN}{postfix}{.ext}
//! ```
//!
//! `_NN` is the 1-based sub-image number, added only for sub-images after
//! the first. An existing path is reused when overwriting is enabled;
//! otherwise `_1`, `_2`, ... is appended to the stem until the name is free.

use crate::config::BatchConfig;
use crate::{BatchError, BatchResult};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Output extension used when none is configured.
pub const DEFAULT_EXTENSION: &str = ".tif";

/// Trims `ext`, falls back to [`DEFAULT_EXTENSION`] and ensures a leading dot.
///
/// ```rust
/// use cosmetic_batch::output::normalize_extension;
///
/// assert_eq!(normalize_extension(""), ".tif");
/// assert_eq!(normalize_extension(" tiff "), ".tiff");
/// assert_eq!(normalize_extension(".tif"), ".tif");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}

/// Naming rules of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    dir: Option<PathBuf>,
    prefix: String,
    postfix: String,
    extension: String,
    overwrite: bool,
}

impl OutputNaming {
    /// Naming rules from a configuration.
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            dir: config
                .output_dir
                .clone()
                .filter(|d| !d.as_os_str().is_empty()),
            prefix: config.prefix.clone(),
            postfix: config.postfix.clone(),
            extension: normalize_extension(&config.output_extension),
            overwrite: config.overwrite,
        }
    }

    /// Candidate path before collision handling.
    pub fn path_for(&self, source: &Path, index: usize) -> BatchResult<PathBuf> {
        let dir = match &self.dir {
            Some(d) => d.clone(),
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        let mut name = source
            .file_stem()
            .map(|s| s.to_string_lossy().trim().to_string())
            .unwrap_or_default();
        name.insert_str(0, &self.prefix);
        if index > 0 {
            name.push_str(&format!("_{:02}", index + 1));
        }
        name.push_str(&self.postfix);
        if name.is_empty() {
            return Err(BatchError::item(source, "unable to determine an output file name"));
        }

        name.push_str(&self.extension);
        Ok(dir.join(name))
    }

    /// Final output path. `exists` reports whether a path is taken.
    pub fn resolve(&self, source: &Path, index: usize, exists: impl Fn(&Path) -> bool) -> BatchResult<PathBuf> {
        let path = self.path_for(source, index)?;
        if !exists(&path) {
            return Ok(path);
        }
        if self.overwrite {
            warn!(path = %path.display(), "Overwriting already existing file");
            return Ok(path);
        }
        let unique = unique_path(&path, exists);
        info!(path = %unique.display(), "File already exists, writing to a new name");
        Ok(unique)
    }
}

fn unique_path(path: &Path, exists: impl Fn(&Path) -> bool) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (1u32..)
        .map(|n| path.with_file_name(format!("{}_{}{}", stem, n, ext)))
        .find(|candidate| !exists(candidate))
        .unwrap_or_else(|| path.to_path_buf())
}
