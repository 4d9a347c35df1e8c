//! Recording runtime used by unit tests

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::{DevConfig, ResolvedConfig};
use crate::error::{DevDockerError, Result};
use crate::runtime::{BuildRequest, ContainerRuntime, ExecMode, RunSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run(RunSpec),
    Exec {
        container: String,
        workdir: PathBuf,
        mode: ExecMode,
        argv: Vec<String>,
    },
    Inspect(String),
    CreateVolume(String),
    CreateNetwork(String),
    Stop(String),
    Remove(String),
    Pull(String),
    Build {
        request: BuildRequest,
        quiet: bool,
        /// Whether the definition file existed while building
        staged: bool,
    },
    Tag(String, String),
    Disposable(Vec<String>),
}

#[derive(Debug, Default)]
pub struct FakeRuntime {
    pub calls: RefCell<Vec<Call>>,
    /// Environment reported for the container; `None` means no container
    pub env: Option<Vec<String>>,
    pub address: Option<String>,
    pub volumes: HashSet<String>,
    pub networks: HashSet<String>,
    /// Exit status per joined argv; anything else exits 0
    pub exec_status: HashMap<String, i32>,
    pub digest: String,
    pub fail_pull: bool,
    pub fail_stop: bool,
    /// Report Ctrl+C during these calls
    pub interrupt_pull: bool,
    pub interrupt_stop: bool,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            digest: format!("sha256:{}", "ab12".repeat(16)),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.env = Some(vec![
            "PATH=/usr/bin".to_string(),
            format!("DEVDOCKER_IMAGE_VERSION={}", version),
        ]);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn runs(&self) -> Vec<RunSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Run(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn execs(&self) -> Vec<(PathBuf, ExecMode, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Exec {
                    workdir, mode, argv, ..
                } => Some((workdir, mode, argv)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl ContainerRuntime for FakeRuntime {
    fn run_detached(&self, spec: &RunSpec) -> Result<()> {
        self.record(Call::Run(spec.clone()));
        Ok(())
    }

    fn exec(&self, container: &str, workdir: &Path, mode: ExecMode, argv: &[String]) -> Result<i32> {
        self.record(Call::Exec {
            container: container.to_string(),
            workdir: workdir.to_path_buf(),
            mode,
            argv: argv.to_vec(),
        });
        Ok(self.exec_status.get(&argv.join(" ")).copied().unwrap_or(0))
    }

    fn container_env(&self, container: &str) -> Result<Option<Vec<String>>> {
        self.record(Call::Inspect(container.to_string()));
        Ok(self.env.clone())
    }

    fn container_address(&self, container: &str) -> Result<String> {
        self.record(Call::Inspect(container.to_string()));
        self.address
            .clone()
            .ok_or_else(|| DevDockerError::ContainerNotRunning {
                container: container.to_string(),
            })
    }

    fn volume_exists(&self, name: &str) -> Result<bool> {
        Ok(self.volumes.contains(name))
    }

    fn network_exists(&self, name: &str) -> Result<bool> {
        Ok(self.networks.contains(name))
    }

    fn create_volume(&self, name: &str) -> Result<()> {
        self.record(Call::CreateVolume(name.to_string()));
        Ok(())
    }

    fn create_network(&self, name: &str) -> Result<()> {
        self.record(Call::CreateNetwork(name.to_string()));
        Ok(())
    }

    fn stop(&self, container: &str) -> Result<()> {
        self.record(Call::Stop(container.to_string()));
        if self.interrupt_stop {
            return Err(interrupted(format!("docker stop {}", container)));
        }
        if self.fail_stop {
            return Err(DevDockerError::RuntimeFailed {
                command: format!("docker stop {}", container),
                status: 1,
            });
        }
        Ok(())
    }

    fn remove(&self, container: &str) -> Result<()> {
        self.record(Call::Remove(container.to_string()));
        Ok(())
    }

    fn pull(&self, image: &str) -> Result<()> {
        self.record(Call::Pull(image.to_string()));
        if self.interrupt_pull {
            return Err(interrupted(format!("docker pull {}", image)));
        }
        if self.fail_pull {
            return Err(DevDockerError::RuntimeFailed {
                command: format!("docker pull {}", image),
                status: 1,
            });
        }
        Ok(())
    }

    fn build(&self, request: &BuildRequest) -> Result<()> {
        self.record(Call::Build {
            request: request.clone(),
            quiet: false,
            staged: request.docker_file.is_file(),
        });
        Ok(())
    }

    fn build_quiet(&self, request: &BuildRequest) -> Result<String> {
        self.record(Call::Build {
            request: request.clone(),
            quiet: true,
            staged: request.docker_file.is_file(),
        });
        Ok(format!("{}\n", self.digest))
    }

    fn tag(&self, image: &str, tag: &str) -> Result<()> {
        self.record(Call::Tag(image.to_string(), tag.to_string()));
        Ok(())
    }

    fn run_disposable(&self, args: &[String]) -> Result<i32> {
        self.record(Call::Disposable(args.to_vec()));
        Ok(0)
    }
}

fn interrupted(command: String) -> DevDockerError {
    DevDockerError::Interrupted {
        command,
        status: 130,
    }
}

/// A resolved config rooted at `root_dir` without touching the filesystem
pub fn resolved_config(root_dir: &Path) -> ResolvedConfig {
    ResolvedConfig {
        config: DevConfig {
            registry: "registry.example.com".to_string(),
            image_name: "builder".to_string(),
            image_version: "20240101-abc".to_string(),
            container_name: "proj-dev".to_string(),
            docker_file: "Dockerfile".to_string(),
            mount: Vec::new(),
            ports: Vec::new(),
            environment: Default::default(),
            post_create_cmds: Vec::new(),
            network: None,
            volume: Vec::new(),
            mount_src_dir: true,
            extra_flags: Vec::new(),
            mutagen: false,
        },
        root_dir: root_dir.to_path_buf(),
        config_path: root_dir.join(".devdockercfg"),
        personal_path: None,
    }
}
