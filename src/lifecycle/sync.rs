//! File-sync helper integration (mutagen)

use std::path::Path;

use crate::error::Result;
use crate::lifecycle::context::CONTAINER_USER;
use crate::paths::CONTAINER_SRC_DIR;
use crate::runtime::RuntimeProcess;

/// Keeps the project root synchronized into the container
pub trait FileSync {
    /// Drop any session named `session`
    fn terminate(&self, session: &str) -> Result<()>;

    /// Start syncing `root_dir` into `container`
    fn create(&self, session: &str, root_dir: &Path, container: &str) -> Result<()>;
}

/// The `mutagen` command line tool
#[derive(Debug, Clone, Default)]
pub struct MutagenCli;

impl MutagenCli {
    fn process(&self) -> RuntimeProcess {
        RuntimeProcess::new("mutagen").arg("sync")
    }
}

/// mutagen endpoint for the project mount inside `container`
pub fn container_endpoint(container: &str) -> String {
    format!("docker://{}@{}{}", CONTAINER_USER, container, CONTAINER_SRC_DIR)
}

impl FileSync for MutagenCli {
    fn terminate(&self, session: &str) -> Result<()> {
        self.process().args(["terminate", session]).run_quiet()
    }

    fn create(&self, session: &str, root_dir: &Path, container: &str) -> Result<()> {
        self.process()
            .args(["create", "--name", session])
            .arg(root_dir.to_string_lossy())
            .arg(container_endpoint(container))
            .run()
    }
}
