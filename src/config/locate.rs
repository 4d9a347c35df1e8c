//! Config file discovery

use std::path::{Path, PathBuf};

use crate::error::{DevDockerError, Result};

/// Walk upward from `start_dir` until a file called `name` is found.
///
/// The directory holding the file becomes the project root, so the tool
/// works from any subdirectory of a project.
pub fn locate_config(name: &str, start_dir: &Path) -> Result<PathBuf> {
    let start = if start_dir.is_absolute() {
        start_dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(start_dir)
    };

    for dir in start.ancestors() {
        let candidate = dir.join(name);
        if candidate.is_file() {
            log::debug!("Found config at {}", candidate.display());
            return Ok(candidate);
        }
    }

    Err(DevDockerError::ConfigNotFound {
        name: name.to_string(),
        start,
    })
}
