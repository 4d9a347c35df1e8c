//! Forwarding a container port to the host
//!
//! A throwaway socat container listens on the host port and proxies to
//! the project container's internal address.

use crate::config::ResolvedConfig;
use crate::error::Result;
use crate::runtime::ContainerRuntime;

/// Image providing the forwarding process
pub const FORWARDER_IMAGE: &str = "alpine/socat";

/// Arguments following `run --rm` for the forwarder
pub fn forward_args(
    address: &str,
    container_port: u16,
    host_port: u16,
    network: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        format!("{}:{}", host_port, host_port),
    ];
    if let Some(network) = network {
        args.push("--network".to_string());
        args.push(network.to_string());
    }
    args.push(FORWARDER_IMAGE.to_string());
    args.push(format!("TCP-LISTEN:{},fork,reuseaddr", host_port));
    args.push(format!("TCP:{}:{}", address, container_port));
    args
}

/// Forward `container_port` of the project container to `host_port`
/// (same number when `None`) until the forwarder exits or Ctrl+C.
pub fn forward<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    resolved: &ResolvedConfig,
    container_port: u16,
    host_port: Option<u16>,
) -> Result<i32> {
    let host_port = host_port.unwrap_or(container_port);
    let container = &resolved.config.container_name;
    let address = runtime.container_address(container)?;

    log::info!(
        "Forwarding localhost:{} to {}:{} ({})",
        host_port,
        address,
        container_port,
        container
    );
    let args = forward_args(
        &address,
        container_port,
        host_port,
        resolved.config.network.as_deref(),
    );
    runtime.run_disposable(&args)
}
