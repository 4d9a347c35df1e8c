//! Composition of the container's run flags

use std::fs;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::Path;

use crate::config::ResolvedConfig;
use crate::error::Result;
use crate::paths::CONTAINER_SRC_DIR;
use crate::runtime::RunSpec;

/// Host address reachable from inside the container
pub const HOST_IP_ENV: &str = "DEVDOCKER_HOST_IP";

/// Image version the container was created from
pub const VERSION_ENV: &str = "DEVDOCKER_IMAGE_VERSION";

/// Address of the interface carrying the default route, or loopback.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn host_ip() -> IpAddr {
    let route = UdpSocket::bind("0.0.0.0:0").and_then(|socket| {
        socket.connect("8.8.8.8:80")?;
        socket.local_addr()
    });
    match route {
        Ok(addr) => addr.ip(),
        Err(e) => {
            log::debug!("Could not determine host IP, using loopback: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// Everything passed to `run` for the project container, in order:
/// env, mounts, ports, network, extra flags.
///
/// Absolute host mount sources that do not exist yet are created.
pub fn run_spec(resolved: &ResolvedConfig, image: &str, host_ip: IpAddr) -> Result<RunSpec> {
    let config = &resolved.config;

    let mut env: Vec<(String, String)> = config
        .environment
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    env.push((HOST_IP_ENV.to_string(), host_ip.to_string()));
    env.push((VERSION_ENV.to_string(), config.image_version.clone()));

    let mut mounts = Vec::new();
    if config.mount_src_dir {
        mounts.push(format!(
            "{}:{}",
            resolved.root_dir.display(),
            CONTAINER_SRC_DIR
        ));
    }
    for mount in &config.mount {
        ensure_mount_source(mount)?;
        mounts.push(mount.clone());
    }

    Ok(RunSpec {
        name: config.container_name.clone(),
        image: image.to_string(),
        env,
        mounts,
        ports: config.ports.clone(),
        network: config.network.clone(),
        extra_flags: config.extra_flags.clone(),
    })
}

fn ensure_mount_source(mount: &str) -> Result<()> {
    let source = mount.split(':').next().unwrap_or_default();
    let source = Path::new(source);
    if source.is_absolute() && !source.exists() {
        log::info!("Creating mount source {}", source.display());
        fs::create_dir_all(source)?;
    }
    Ok(())
}
