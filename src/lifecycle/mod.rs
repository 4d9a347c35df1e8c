//! Container lifecycle: create, version check, exec and shell
//!
//! No container state is kept locally. Every operation acts on whatever
//! the runtime currently reports for the configured container name.

pub mod context;
pub mod flags;
pub mod sync;

pub use context::{current_uid, StagedContext};
pub use flags::{host_ip, run_spec, HOST_IP_ENV, VERSION_ENV};
pub use sync::{FileSync, MutagenCli};

use std::path::Path;

use crate::config::ResolvedConfig;
use crate::error::{DevDockerError, Result};
use crate::image;
use crate::paths::{translate, CONTAINER_SRC_DIR};
use crate::runtime::{ContainerRuntime, ExecMode};

/// Shell started by `devdocker shell`
pub const SHELL: &str = "bash";

/// Drives one project container through the runtime
pub struct Lifecycle<'a, R: ContainerRuntime + ?Sized> {
    runtime: &'a R,
    sync: &'a dyn FileSync,
    resolved: &'a ResolvedConfig,
}

impl<'a, R: ContainerRuntime + ?Sized> Lifecycle<'a, R> {
    pub fn new(runtime: &'a R, sync: &'a dyn FileSync, resolved: &'a ResolvedConfig) -> Self {
        Self {
            runtime,
            sync,
            resolved,
        }
    }

    fn container(&self) -> &str {
        &self.resolved.config.container_name
    }

    /// (Re)create the project container from the configured image
    pub fn create(&self) -> Result<()> {
        let config = &self.resolved.config;
        let base_image = self.resolved.image_tag();

        // Dropped on every return path, removing the directory
        let staged = StagedContext::stage()?;

        log::info!("Pulling {}", base_image);
        match self.runtime.pull(&base_image) {
            Err(e) if e.is_interrupt() => return Err(e),
            Err(e) => log::warn!("Pull failed, continuing with local image: {}", e),
            Ok(()) => {}
        }

        let digest = image::build(self.runtime, &staged.build_request(&base_image, current_uid()))?;

        self.remove_existing()?;

        if config.mutagen {
            match self.sync.terminate(self.container()) {
                Err(e) if e.is_interrupt() => return Err(e),
                Err(e) => log::debug!("No sync session to terminate: {}", e),
                Ok(()) => {}
            }
        }

        self.ensure_volumes()?;
        self.ensure_network()?;

        let spec = run_spec(self.resolved, &digest, host_ip())?;
        log::info!("Starting container {}", spec.name);
        self.runtime.run_detached(&spec)?;

        self.run_post_create()?;

        if config.mutagen {
            log::info!("Starting file sync");
            self.sync
                .create(self.container(), &self.resolved.root_dir, self.container())?;
        }

        drop(staged);
        Ok(())
    }

    /// Stop, then remove, any container already using the configured name.
    /// Failures are tolerated since there may be nothing to remove; Ctrl+C is not.
    fn remove_existing(&self) -> Result<()> {
        let name = self.container();
        match self.runtime.stop(name) {
            Err(e) if e.is_interrupt() => return Err(e),
            Err(e) => log::debug!("Stop {}: {}", name, e),
            Ok(()) => {}
        }
        match self.runtime.remove(name) {
            Err(e) if e.is_interrupt() => Err(e),
            Err(e) => {
                log::debug!("Remove {}: {}", name, e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    fn ensure_volumes(&self) -> Result<()> {
        for volume in &self.resolved.config.volume {
            if !self.runtime.volume_exists(volume)? {
                log::info!("Creating volume {}", volume);
                self.runtime.create_volume(volume)?;
            }
        }
        Ok(())
    }

    fn ensure_network(&self) -> Result<()> {
        if let Some(network) = &self.resolved.config.network {
            if !self.runtime.network_exists(network)? {
                log::info!("Creating network {}", network);
                self.runtime.create_network(network)?;
            }
        }
        Ok(())
    }

    fn run_post_create(&self) -> Result<()> {
        for cmd in &self.resolved.config.post_create_cmds {
            let command = cmd.join(" ");
            log::info!("Running post-create command: {}", command);
            let status = self.runtime.exec(
                self.container(),
                Path::new(CONTAINER_SRC_DIR),
                ExecMode::NoInput,
                cmd,
            )?;
            if status != 0 {
                return Err(DevDockerError::PostCreateFailed { command, status });
            }
        }
        Ok(())
    }

    /// Fail unless the container was created from the configured image version
    pub fn version_check(&self, strict: bool) -> Result<()> {
        if !strict {
            return Ok(());
        }

        let name = self.container();
        let env = self.runtime.container_env(name)?.unwrap_or_default();
        let stamped = env.iter().find_map(|entry| match entry.split_once('=') {
            Some((key, value)) if key == VERSION_ENV => Some(value),
            _ => None,
        });

        match stamped {
            None => Err(DevDockerError::VersionMissing {
                container: name.to_string(),
            }),
            Some(found) if found != self.resolved.config.image_version => {
                Err(DevDockerError::VersionMismatch {
                    container: name.to_string(),
                    found: found.to_string(),
                    expected: self.resolved.config.image_version.clone(),
                })
            }
            Some(_) => Ok(()),
        }
    }

    /// Run `argv` in the container from the in-container equivalent of `cwd`
    pub fn exec(&self, cwd: &Path, argv: &[String], mode: ExecMode, strict: bool) -> Result<i32> {
        self.version_check(strict)?;
        let workdir = translate(cwd, &self.resolved.root_dir);
        log::debug!("Exec in {} at {}", self.container(), workdir.display());
        self.runtime.exec(self.container(), &workdir, mode, argv)
    }

    /// Interactive shell in the container, starting at the mapped `cwd`
    pub fn shell(&self, cwd: &Path, strict: bool) -> Result<i32> {
        self.exec(cwd, &[SHELL.to_string()], ExecMode::Interactive, strict)
    }
}
