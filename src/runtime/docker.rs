//! `docker` command line implementation of the runtime boundary

use std::io::IsTerminal;
use std::path::Path;

use crate::error::{DevDockerError, Result};
use crate::runtime::{BuildRequest, ContainerRuntime, ExecMode, OnInterrupt, RunSpec, RuntimeProcess};

/// Environment variable naming an alternative runtime binary
pub const RUNTIME_ENV: &str = "DEVDOCKER_RUNTIME";

const DEFAULT_BINARY: &str = "docker";

/// Delay before starting an interactive command so the terminal size settles
const INTERACTIVE_DELAY: &str = "0.1";

/// stderr fragments the runtime prints when the inspected container does not exist
const MISSING_CONTAINER: [&str; 2] = ["no such object", "no such container"];

const ENV_FORMAT: &str = "{{json .Config.Env}}";
const ADDRESS_FORMAT: &str = "{{range .NetworkSettings.Networks}}{{.IPAddress}} {{end}}";

/// Talks to a docker-compatible CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Use `$DEVDOCKER_RUNTIME`, falling back to `docker`
    pub fn from_env() -> Self {
        let binary = std::env::var(RUNTIME_ENV)
            .ok()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BINARY.to_string());
        Self::new(binary)
    }

    /// Program invoked for every runtime call
    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn process(&self) -> RuntimeProcess {
        RuntimeProcess::new(self.binary.clone())
    }

    fn build_process(&self) -> RuntimeProcess {
        self.process().env("DOCKER_BUILDKIT", "1").arg("build")
    }
}

/// Arguments for `exec` in the given mode
pub fn exec_args(
    container: &str,
    workdir: &Path,
    mode: ExecMode,
    argv: &[String],
    stdin_is_terminal: bool,
) -> Vec<String> {
    let mut args = vec!["exec".to_string()];
    match mode {
        ExecMode::Interactive => args.push("-it".to_string()),
        ExecMode::Tty => args.push("-t".to_string()),
        ExecMode::Plain if !stdin_is_terminal => args.push("-i".to_string()),
        ExecMode::Plain | ExecMode::NoInput => {}
    }
    args.push("-w".to_string());
    args.push(workdir.to_string_lossy().into_owned());
    args.push(container.to_string());

    if mode == ExecMode::Interactive {
        args.push("bash".to_string());
        args.push("-c".to_string());
        args.push(format!("sleep {}; exec \"$@\"", INTERACTIVE_DELAY));
        args.push("bash".to_string());
    }
    args.extend(argv.iter().cloned());
    args
}

/// Whether inspect's stderr says the container does not exist
pub fn is_missing_container(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    MISSING_CONTAINER.iter().any(|marker| stderr.contains(marker))
}

/// Parse the JSON array printed for a container's environment
pub fn parse_env(output: &str) -> Result<Vec<String>> {
    let env: Option<Vec<String>> =
        serde_json::from_str(output.trim()).map_err(|e| DevDockerError::UnexpectedOutput {
            command: "inspect".to_string(),
            message: e.to_string(),
        })?;
    Ok(env.unwrap_or_default())
}

impl ContainerRuntime for DockerCli {
    fn run_detached(&self, spec: &RunSpec) -> Result<()> {
        self.process().arg("run").args(spec.to_args()).run()
    }

    fn exec(&self, container: &str, workdir: &Path, mode: ExecMode, argv: &[String]) -> Result<i32> {
        let args = exec_args(container, workdir, mode, argv, std::io::stdin().is_terminal());
        let process = self.process().args(args);
        if mode == ExecMode::NoInput {
            process.no_stdin().status()
        } else {
            process.status()
        }
    }

    fn container_env(&self, container: &str) -> Result<Option<Vec<String>>> {
        let output = self
            .process()
            .args(["inspect", "--type", "container", "--format", ENV_FORMAT, container])
            .output_or_missing(is_missing_container)?;
        output.map(|out| parse_env(&out)).transpose()
    }

    fn container_address(&self, container: &str) -> Result<String> {
        let output = self
            .process()
            .args(["inspect", "--type", "container", "--format", ADDRESS_FORMAT, container])
            .output()?;
        output
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| DevDockerError::ContainerNotRunning {
                container: container.to_string(),
            })
    }

    fn volume_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .process()
            .args(["volume", "inspect", name])
            .try_output()?
            .is_some())
    }

    fn network_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .process()
            .args(["network", "inspect", name])
            .try_output()?
            .is_some())
    }

    fn create_volume(&self, name: &str) -> Result<()> {
        self.process().args(["volume", "create", name]).run_quiet()
    }

    fn create_network(&self, name: &str) -> Result<()> {
        self.process().args(["network", "create", name]).run_quiet()
    }

    fn stop(&self, container: &str) -> Result<()> {
        self.process().args(["stop", container]).run_quiet()
    }

    fn remove(&self, container: &str) -> Result<()> {
        self.process().args(["rm", "-f", container]).run_quiet()
    }

    fn pull(&self, image: &str) -> Result<()> {
        self.process().args(["pull", image]).run()
    }

    fn build(&self, request: &BuildRequest) -> Result<()> {
        self.build_process().args(request.to_args()).run()
    }

    fn build_quiet(&self, request: &BuildRequest) -> Result<String> {
        self.build_process().arg("-q").args(request.to_args()).output()
    }

    fn tag(&self, image: &str, tag: &str) -> Result<()> {
        self.process().args(["tag", image, tag]).run()
    }

    fn run_disposable(&self, args: &[String]) -> Result<i32> {
        self.process()
            .args(["run", "--rm"])
            .args(args.iter().cloned())
            .on_interrupt(OnInterrupt::StopWaiting)
            .status()
    }
}
