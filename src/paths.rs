//! Host to container path mapping

use std::path::{Component, Path, PathBuf};

/// Where the project root is mounted inside the container
pub const CONTAINER_SRC_DIR: &str = "/src";

/// Map `host_path`, which must lie inside `root_dir`, to its in-container path.
///
/// Both paths are made absolute and lexically normalized first. Paths
/// outside `root_dir` have no meaningful translation; they are returned
/// relative to the mount point unchanged, and callers must not rely on
/// the result.
pub fn translate(host_path: &Path, root_dir: &Path) -> PathBuf {
    let host = normalize(host_path);
    let root = normalize(root_dir);

    match host.strip_prefix(&root) {
        Ok(rest) if rest.as_os_str().is_empty() => PathBuf::from(CONTAINER_SRC_DIR),
        Ok(rest) => Path::new(CONTAINER_SRC_DIR).join(rest),
        Err(_) => {
            log::debug!(
                "{} is outside project root {}",
                host.display(),
                root.display()
            );
            Path::new(CONTAINER_SRC_DIR).join(host.strip_prefix("/").unwrap_or(&host))
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
