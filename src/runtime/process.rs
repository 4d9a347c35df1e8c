//! Signal-aware child process invocation
//!
//! Every call into the container runtime (or a helper such as the sync
//! tool) goes through [`RuntimeProcess`]. A single Ctrl+C handler is
//! installed for the whole process; while a child runs, an interrupt is
//! handled according to the invocation's [`OnInterrupt`] policy instead
//! of killing this wrapper outright.

use std::collections::BTreeMap;
use std::io::Read;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{DevDockerError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static HANDLER: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Install the process-wide Ctrl+C handler (idempotent)
pub fn install_interrupt_handler() -> Result<()> {
    HANDLER
        .get_or_init(|| {
            ctrlc::set_handler(|| {
                INTERRUPTED.store(true, Ordering::SeqCst);
            })
            .map_err(|e| e.to_string())
        })
        .clone()
        .map_err(DevDockerError::InterruptHandler)
}

/// What to do when Ctrl+C arrives while waiting on the child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnInterrupt {
    /// Kill the local child, warn that remote work may continue and fail
    /// with [`DevDockerError::Interrupted`] carrying its status
    KillAndWarn,
    /// Stop waiting and report success; the child is not tracked further
    StopWaiting,
}

/// A single external command invocation
#[derive(Debug, Clone)]
pub struct RuntimeProcess {
    program: String,
    args: Vec<String>,
    envs: BTreeMap<String, String>,
    on_interrupt: OnInterrupt,
    stdin_null: bool,
}

impl RuntimeProcess {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: BTreeMap::new(),
            on_interrupt: OnInterrupt::KillAndWarn,
            stdin_null: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for this child only
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn on_interrupt(mut self, policy: OnInterrupt) -> Self {
        self.on_interrupt = policy;
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_envs(&self) -> &BTreeMap<String, String> {
        &self.envs
    }

    /// Command line as shown in logs and error messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run without any standard input
    pub fn no_stdin(mut self) -> Self {
        self.stdin_null = true;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.envs);
        if self.stdin_null {
            cmd.stdin(Stdio::null());
        }
        cmd
    }

    fn spawn(&self, cmd: &mut Command) -> Result<Child> {
        install_interrupt_handler()?;
        INTERRUPTED.store(false, Ordering::SeqCst);
        Ok(cmd.spawn()?)
    }

    /// Wait for `child`, applying the interrupt policy.
    ///
    /// A child that exits on its own after Ctrl+C (it shares our terminal)
    /// still counts as interrupted.
    fn wait(&self, child: &mut Child) -> Result<i32> {
        loop {
            if let Some(status) = child.try_wait()? {
                let status = exit_code(status);
                if INTERRUPTED.swap(false, Ordering::SeqCst) {
                    return self.interrupted(status);
                }
                return Ok(status);
            }

            if INTERRUPTED.swap(false, Ordering::SeqCst) {
                if self.on_interrupt == OnInterrupt::KillAndWarn {
                    if let Err(e) = child.kill() {
                        log::debug!("Failed to kill child: {}", e);
                    }
                    let status = exit_code(child.wait()?);
                    return self.interrupted(status);
                }
                return self.interrupted(0);
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    fn interrupted(&self, status: i32) -> Result<i32> {
        match self.on_interrupt {
            OnInterrupt::KillAndWarn => {
                log::warn!(
                    "Interrupted `{}`; the process inside the container may still be running",
                    self.display()
                );
                Err(DevDockerError::Interrupted {
                    command: self.display(),
                    status,
                })
            }
            OnInterrupt::StopWaiting => {
                log::info!("Interrupted, no longer waiting on `{}`", self.display());
                Ok(0)
            }
        }
    }

    /// Run with inherited stdio and return the child's exit status
    pub fn status(&self) -> Result<i32> {
        log::debug!("Running: {}", self.display());
        let mut child = self.spawn(&mut self.command())?;
        self.wait(&mut child)
    }

    /// Run with inherited stdio; a non-zero status is an error
    pub fn run(&self) -> Result<()> {
        match self.status()? {
            0 => Ok(()),
            status => Err(self.failed(status)),
        }
    }

    /// Run with all output discarded; a non-zero status is an error
    pub fn run_quiet(&self) -> Result<()> {
        log::debug!("Running quietly: {}", self.display());
        let mut cmd = self.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let mut child = self.spawn(&mut cmd)?;
        match self.wait(&mut child)? {
            0 => Ok(()),
            status => Err(self.failed(status)),
        }
    }

    /// Run and capture stdout; a non-zero status is an error
    pub fn output(&self) -> Result<String> {
        let captured = self.capture()?;
        match captured.status {
            0 => Ok(captured.stdout),
            status => {
                captured.log_stderr();
                Err(self.failed(status))
            }
        }
    }

    /// Run and capture stdout, or `None` if the child failed
    pub fn try_output(&self) -> Result<Option<String>> {
        let captured = self.capture()?;
        match captured.status {
            0 => Ok(Some(captured.stdout)),
            _ => Ok(None),
        }
    }

    /// Run and capture stdout, or `None` if the child failed with stderr
    /// accepted by `missing`. Any other failure is an error.
    pub fn output_or_missing(&self, missing: impl Fn(&str) -> bool) -> Result<Option<String>> {
        let captured = self.capture()?;
        match captured.status {
            0 => Ok(Some(captured.stdout)),
            _ if missing(&captured.stderr) => Ok(None),
            status => {
                captured.log_stderr();
                Err(self.failed(status))
            }
        }
    }

    fn capture(&self) -> Result<Captured> {
        log::debug!("Capturing: {}", self.display());
        let mut cmd = self.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = self.spawn(&mut cmd)?;

        let stdout = read_pipe(child.stdout.take());
        let stderr = read_pipe(child.stderr.take());
        let status = self.wait(&mut child)?;

        Ok(Captured {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }

    fn failed(&self, status: i32) -> DevDockerError {
        DevDockerError::RuntimeFailed {
            command: self.display(),
            status,
        }
    }
}

struct Captured {
    status: i32,
    stdout: String,
    stderr: String,
}

impl Captured {
    fn log_stderr(&self) {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            log::warn!("{}", stderr);
        }
    }
}

fn read_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf) {
                log::debug!("Reading child output: {}", e);
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Exit code of a finished child, using the shell's 128+signal convention
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};
    use std::time::Instant;

    // Children and the interrupt flag are process-wide
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn interrupt_after(delay: Duration) -> JoinHandle<()> {
        install_interrupt_handler().unwrap();
        thread::spawn(move || {
            thread::sleep(delay);
            unsafe {
                libc::raise(libc::SIGINT);
            }
        })
    }

    #[test]
    fn test_display() {
        let process = RuntimeProcess::new("docker").arg("exec").args(["-it", "dev"]);
        assert_eq!(process.display(), "docker exec -it dev");
    }

    #[test]
    fn test_status_propagates_exit_code() {
        let _guard = serial();
        let status = RuntimeProcess::new("sh").args(["-c", "exit 7"]).status().unwrap();
        assert_eq!(status, 7);
    }

    #[test]
    fn test_run_reports_failure() {
        let _guard = serial();
        let err = RuntimeProcess::new("sh").args(["-c", "exit 3"]).run().unwrap_err();
        assert!(matches!(err, DevDockerError::RuntimeFailed { status: 3, .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_env_is_scoped_to_child() {
        let _guard = serial();
        let out = RuntimeProcess::new("sh")
            .args(["-c", "printf %s \"$DEVDOCKER_TEST_SCOPED\""])
            .env("DEVDOCKER_TEST_SCOPED", "1")
            .output()
            .unwrap();
        assert_eq!(out, "1");
        assert!(std::env::var("DEVDOCKER_TEST_SCOPED").is_err());
    }

    #[test]
    fn test_try_output_on_failure() {
        let _guard = serial();
        let out = RuntimeProcess::new("sh").args(["-c", "echo hi; exit 1"]).try_output().unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_output_or_missing() {
        let _guard = serial();
        let missing = |stderr: &str| stderr.contains("No such object");

        let found = RuntimeProcess::new("sh")
            .args(["-c", "echo '[]'"])
            .output_or_missing(missing)
            .unwrap();
        assert_eq!(found.as_deref(), Some("[]\n"));

        let absent = RuntimeProcess::new("sh")
            .args(["-c", "echo 'Error: No such object: dev' >&2; exit 1"])
            .output_or_missing(missing)
            .unwrap();
        assert!(absent.is_none());

        let err = RuntimeProcess::new("sh")
            .args(["-c", "echo 'Cannot connect to the daemon' >&2; exit 1"])
            .output_or_missing(missing)
            .unwrap_err();
        assert!(matches!(err, DevDockerError::RuntimeFailed { status: 1, .. }));
    }

    #[test]
    fn test_no_stdin() {
        let _guard = serial();
        let out = RuntimeProcess::new("sh")
            .args(["-c", "cat; echo done"])
            .no_stdin()
            .status()
            .unwrap();
        assert_eq!(out, 0);
    }

    #[test]
    fn test_interrupt_kills_child() {
        let _guard = serial();
        let started = Instant::now();
        let raiser = interrupt_after(Duration::from_millis(300));

        let err = RuntimeProcess::new("sleep").arg("5").status().unwrap_err();
        raiser.join().unwrap();

        assert!(matches!(err, DevDockerError::Interrupted { status: 137, .. }));
        assert_eq!(err.exit_code(), 137);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_interrupt_fails_quiet_run() {
        let _guard = serial();
        let raiser = interrupt_after(Duration::from_millis(300));

        let err = RuntimeProcess::new("sleep").arg("5").run_quiet().unwrap_err();
        raiser.join().unwrap();

        assert!(err.is_interrupt());
    }

    #[test]
    fn test_interrupt_stops_waiting() {
        let _guard = serial();
        let started = Instant::now();
        let raiser = interrupt_after(Duration::from_millis(300));

        let status = RuntimeProcess::new("sleep")
            .arg("5")
            .on_interrupt(OnInterrupt::StopWaiting)
            .status()
            .unwrap();
        raiser.join().unwrap();

        assert_eq!(status, 0);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_exit_code_for_signal() {
        let status = ExitStatus::from_raw(9);
        assert_eq!(exit_code(status), 137);
    }

    #[test]
    fn test_install_handler_twice() {
        install_interrupt_handler().unwrap();
        install_interrupt_handler().unwrap();
    }
}
