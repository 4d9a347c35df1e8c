//! Container runtime boundary
//!
//! The runtime is a black box reached through child processes. Everything
//! else in the crate talks to it through [`ContainerRuntime`], which keeps
//! the orchestration logic testable without a daemon.

pub mod docker;
pub mod process;

#[cfg(test)]
pub(crate) mod fake;

pub use docker::DockerCli;
pub use process::{install_interrupt_handler, OnInterrupt, RuntimeProcess};

use std::path::{Path, PathBuf};

use crate::error::Result;

/// How a command is attached to the local terminal when run in the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Pseudo-terminal, command started through a shell after a short delay
    Interactive,
    /// Pseudo-terminal, command started directly
    Tty,
    /// No terminal; stdin is piped through only when it is not a terminal
    Plain,
    /// No terminal and no stdin, for unattended commands
    NoInput,
}

/// Everything needed to launch the long-lived project container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<String>,
    pub ports: Vec<String>,
    pub network: Option<String>,
    pub extra_flags: Vec<String>,
}

impl RunSpec {
    /// Arguments following `run`, in the order env, mounts, ports, network, extra flags
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-d".to_string(),
            "-it".to_string(),
            "--privileged".to_string(),
            "--name".to_string(),
            self.name.clone(),
        ];

        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        for mount in &self.mounts {
            args.push("-v".to_string());
            args.push(mount.clone());
        }
        for port in &self.ports {
            args.push("-p".to_string());
            args.push(port.clone());
        }
        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        args.extend(self.extra_flags.iter().cloned());
        args.push(self.image.clone());
        args
    }
}

/// An image build: definition file, context directory and build args
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub context_dir: PathBuf,
    pub docker_file: PathBuf,
    pub build_args: Vec<(String, String)>,
}

impl BuildRequest {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.docker_file.to_string_lossy().into_owned(),
        ];
        for (key, value) in &self.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(self.context_dir.to_string_lossy().into_owned());
        args
    }
}

/// Operations this tool needs from a container runtime
pub trait ContainerRuntime {
    /// Start the named container detached
    fn run_detached(&self, spec: &RunSpec) -> Result<()>;

    /// Run `argv` inside `container` from `workdir`, returning its exit status
    fn exec(&self, container: &str, workdir: &Path, mode: ExecMode, argv: &[String]) -> Result<i32>;

    /// `KEY=VALUE` environment recorded on the container, `None` if it does not exist.
    /// Failing to reach the runtime is an error, not a missing container.
    fn container_env(&self, container: &str) -> Result<Option<Vec<String>>>;

    /// Internal network address of a running container
    fn container_address(&self, container: &str) -> Result<String>;

    fn volume_exists(&self, name: &str) -> Result<bool>;
    fn network_exists(&self, name: &str) -> Result<bool>;
    fn create_volume(&self, name: &str) -> Result<()>;
    fn create_network(&self, name: &str) -> Result<()>;

    fn stop(&self, container: &str) -> Result<()>;
    fn remove(&self, container: &str) -> Result<()>;
    fn pull(&self, image: &str) -> Result<()>;

    /// Build with progress shown to the user
    fn build(&self, request: &BuildRequest) -> Result<()>;

    /// Build quietly, returning whatever the runtime prints (the image id)
    fn build_quiet(&self, request: &BuildRequest) -> Result<String>;

    fn tag(&self, image: &str, tag: &str) -> Result<()>;

    /// Run a throwaway container in the foreground; Ctrl+C just stops waiting
    fn run_disposable(&self, args: &[String]) -> Result<i32>;
}
