//! Staged build context for the wrapper image
//!
//! The wrapper image adds a non-root user matching the invoking host user
//! on top of the configured base image. The context lives in a temporary
//! directory that is removed when the [`StagedContext`] is dropped, on
//! success and on every error path alike.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::error::Result;
use crate::paths::CONTAINER_SRC_DIR;
use crate::runtime::BuildRequest;

/// User created inside the container
pub const CONTAINER_USER: &str = "dev";

/// Directory shared between containers of the same host
pub const SHARED_DIR: &str = "/shared";

const DOCKERFILE_NAME: &str = "Dockerfile";

fn wrapper_dockerfile() -> String {
    format!(
        r#"ARG BASE_IMAGE
FROM ${{BASE_IMAGE}}
ARG UID
USER root
RUN existing="$(getent passwd "${{UID}}" | cut -d: -f1)"; \
    if [ -n "$existing" ]; then userdel -f "$existing" || true; fi; \
    useradd --create-home --non-unique --uid "${{UID}}" --shell /bin/bash {user}
RUN mkdir -p {src} {shared} && chown {user} {src} {shared}
RUN mkdir -p /etc/sudoers.d && \
    echo "{user} ALL=(ALL) NOPASSWD:ALL" > /etc/sudoers.d/{user} && \
    chmod 0440 /etc/sudoers.d/{user}
USER {user}
WORKDIR {src}
"#,
        user = CONTAINER_USER,
        src = CONTAINER_SRC_DIR,
        shared = SHARED_DIR,
    )
}

/// Temporary directory holding the wrapper image definition
#[derive(Debug)]
pub struct StagedContext {
    dir: TempDir,
}

impl StagedContext {
    pub fn stage() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("devdocker-").tempdir()?;
        fs::write(dir.path().join(DOCKERFILE_NAME), wrapper_dockerfile())?;
        log::debug!("Staged build context in {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Build request for the wrapper over `base_image`, owned by `uid`
    pub fn build_request(&self, base_image: &str, uid: u32) -> BuildRequest {
        BuildRequest {
            context_dir: self.path().to_path_buf(),
            docker_file: self.path().join(DOCKERFILE_NAME),
            build_args: vec![
                ("BASE_IMAGE".to_string(), base_image.to_string()),
                ("UID".to_string(), uid.to_string()),
            ],
        }
    }
}

/// Numeric id of the invoking user
pub fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail
    unsafe { libc::getuid() }
}
