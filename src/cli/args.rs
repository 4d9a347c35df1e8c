//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_NAME;
use crate::runtime::ExecMode;

#[derive(Parser, Debug)]
#[command(name = "devdocker")]
#[command(author, version, about = "Manage a per-project development container", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Config filename to look for, walking up from the current directory
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_NAME)]
    pub cfg: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum SubCommand {
    /// (Re)create the development container
    Create,

    /// Run a command in the container
    Exec {
        /// Allocate a terminal and start the command through a shell
        #[arg(long, conflicts_with = "tty")]
        interactive: bool,

        /// Allocate a terminal and start the command directly
        #[arg(long)]
        tty: bool,

        /// Skip the container version check
        #[arg(long)]
        no_strict: bool,

        /// Host directory to run from (default: current directory)
        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,

        /// Command to run, after `--`
        #[arg(last = true, required = true, value_name = "CMD")]
        command: Vec<String>,
    },

    /// Open an interactive shell in the container
    Shell {
        /// Skip the container version check
        #[arg(long)]
        no_strict: bool,
    },

    /// Build and tag the project image
    Mkimg {
        /// Tag with the configured version instead of generating one
        #[arg(long)]
        retag: bool,
    },

    /// Forward a container port to the host
    Portfwd {
        container_port: u16,

        /// Host port (default: same as CONTAINER_PORT)
        host_port: Option<u16>,
    },
}

impl SubCommand {
    /// Terminal mode requested for `exec`
    pub fn exec_mode(interactive: bool, tty: bool) -> ExecMode {
        match (interactive, tty) {
            (true, _) => ExecMode::Interactive,
            (false, true) => ExecMode::Tty,
            (false, false) => ExecMode::Plain,
        }
    }
}
