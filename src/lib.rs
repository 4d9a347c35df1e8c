//! devdocker - per-project development containers
//!
//! Finds the project's config by walking up from the working directory,
//! derives the image and container identity from it, and drives the
//! container runtime to create the container, check it still matches the
//! config, and run commands inside it at the matching working directory.
//!
//! # Example
//!
//! ```no_run
//! use devdocker::config::{resolve, DEFAULT_CONFIG_NAME};
//! use devdocker::lifecycle::{Lifecycle, MutagenCli};
//! use devdocker::runtime::{DockerCli, ExecMode};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let resolved = resolve(DEFAULT_CONFIG_NAME, &cwd).unwrap();
//! let runtime = DockerCli::from_env();
//! let lifecycle = Lifecycle::new(&runtime, &MutagenCli, &resolved);
//! let status = lifecycle.exec(&cwd, &["make".to_string()], ExecMode::Plain, true).unwrap();
//! std::process::exit(status);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod lifecycle;
pub mod paths;
pub mod portfwd;
pub mod runtime;

pub use config::{resolve, DevConfig, ResolvedConfig};
pub use error::{DevDockerError, Result};
pub use lifecycle::Lifecycle;
pub use paths::translate;
pub use runtime::{ContainerRuntime, DockerCli, ExecMode};
