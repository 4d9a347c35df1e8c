//! devdocker CLI - manage a per-project development container

use clap::Parser;
use devdocker::cli::{Args, SubCommand};
use devdocker::lifecycle::{Lifecycle, MutagenCli};
use devdocker::runtime::DockerCli;
use devdocker::{config, image, portfwd};

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run(args: Args) -> devdocker::Result<i32> {
    let cwd = std::env::current_dir()?;
    let resolved = config::resolve(&args.cfg, &cwd)?;
    log::debug!(
        "Using {} (image {})",
        resolved.config_path.display(),
        resolved.image_tag()
    );

    let runtime = DockerCli::from_env();
    let sync = MutagenCli;
    let lifecycle = Lifecycle::new(&runtime, &sync, &resolved);

    match args.command {
        SubCommand::Create => {
            lifecycle.create()?;
            println!("Container {} is ready", resolved.config.container_name);
            Ok(0)
        }

        SubCommand::Exec {
            interactive,
            tty,
            no_strict,
            cwd: dir,
            command,
        } => {
            let dir = dir.map(|d| cwd.join(d)).unwrap_or(cwd);
            let mode = SubCommand::exec_mode(interactive, tty);
            lifecycle.exec(&dir, &command, mode, !no_strict)
        }

        SubCommand::Shell { no_strict } => lifecycle.shell(&cwd, !no_strict),

        SubCommand::Mkimg { retag } => {
            let today = chrono::Local::now().date_naive();
            let report = image::mkimg(&runtime, &resolved, retag, today)?;

            println!("Tagged {} as {}", report.digest, report.tag);
            println!("Publish with:\n  {}", report.push_command(runtime.binary()));
            if let Some(edit) = report.config_edit() {
                println!(
                    "Adopt it by setting in {}:\n  {}",
                    resolved.config_path.display(),
                    edit
                );
            }
            Ok(0)
        }

        SubCommand::Portfwd {
            container_port,
            host_port,
        } => portfwd::forward(&runtime, &resolved, container_port, host_port),
    }
}
