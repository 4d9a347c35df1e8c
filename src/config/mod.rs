//! Project configuration
//!
//! The primary config file is found by walking up from the working
//! directory. Its directory becomes the project root. An optional
//! personal override document living next to it is merged on top.

mod document;
mod locate;

pub use document::{load_document, merge_all, merge_documents, parse_document, Document, INCLUDE_KEY};
pub use locate::locate_config;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{DevDockerError, Result};

/// Default primary config filename
pub const DEFAULT_CONFIG_NAME: &str = ".devdockercfg";

/// Suffix appended to the primary filename for the personal override
pub const PERSONAL_SUFFIX: &str = ".personal";

/// Typed view of a merged config document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DevConfig {
    pub registry: String,
    pub image_name: String,
    pub image_version: String,
    pub container_name: String,
    pub docker_file: String,
    /// `host/path:container/path[:opts]` bind mounts
    #[serde(default)]
    pub mount: Vec<String>,
    /// `[hostIp:][hostPort:]containerPort[/proto]` publish specs
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub post_create_cmds: Vec<Vec<String>>,
    #[serde(default)]
    pub network: Option<String>,
    /// External volumes that must exist before the container starts
    #[serde(default)]
    pub volume: Vec<String>,
    #[serde(default = "default_true")]
    pub mount_src_dir: bool,
    #[serde(default)]
    pub extra_flags: Vec<String>,
    #[serde(default)]
    pub mutagen: bool,
}

fn default_true() -> bool {
    true
}

/// Config for one invocation, plus where it came from
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: DevConfig,
    /// Directory holding the primary config file
    pub root_dir: PathBuf,
    pub config_path: PathBuf,
    /// Personal override that was merged in, if any
    pub personal_path: Option<PathBuf>,
}

impl ResolvedConfig {
    /// `registry/imageName:imageVersion`, always derived from the source fields
    pub fn image_tag(&self) -> String {
        self.tag_for(&self.config.image_version)
    }

    /// Image reference for an arbitrary version of this project's image
    pub fn tag_for(&self, version: &str) -> String {
        format!(
            "{}/{}:{}",
            self.config.registry, self.config.image_name, version
        )
    }

    /// Absolute path of the project's build definition file
    pub fn docker_file_path(&self) -> PathBuf {
        self.root_dir.join(&self.config.docker_file)
    }
}

/// Path of the personal override for a given primary config file
pub fn personal_path_for(config_path: &Path) -> PathBuf {
    let mut name = config_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(PERSONAL_SUFFIX);
    config_path.with_file_name(name)
}

/// Locate, load, merge and validate the config named `name` starting at `cwd`.
pub fn resolve(name: &str, cwd: &Path) -> Result<ResolvedConfig> {
    let config_path = locate_config(name, cwd)?;
    let root_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    let primary = load_document(&config_path)?;

    let personal = personal_path_for(&config_path);
    let (merged, personal_path) = if personal.is_file() {
        log::debug!("Merging personal override {}", personal.display());
        let overlay = load_document(&personal)?;
        (merge_documents(&primary, &overlay)?, Some(personal))
    } else {
        (primary, None)
    };

    let config = into_config(merged, &config_path)?;

    Ok(ResolvedConfig {
        config,
        root_dir,
        config_path,
        personal_path,
    })
}

/// Deserialize and validate a merged document
pub fn into_config(doc: Document, path: &Path) -> Result<DevConfig> {
    let config = toml::Value::Table(doc)
        .try_into::<DevConfig>()
        .map_err(|e| DevDockerError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;
    validate(&config).map_err(|message| DevDockerError::ConfigInvalid {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(config)
}

fn port_spec() -> &'static Regex {
    static PORT_SPEC: OnceLock<Regex> = OnceLock::new();
    PORT_SPEC.get_or_init(|| {
        Regex::new(r"^(?:(?:[0-9.]+|\[[0-9a-fA-F:]+\]):)?(?:\d+(?:-\d+)?:)?\d+(?:-\d+)?(?:/(?:tcp|udp|sctp))?$")
            .expect("port spec pattern is valid")
    })
}

fn validate(config: &DevConfig) -> std::result::Result<(), String> {
    let required = [
        ("registry", &config.registry),
        ("imageName", &config.image_name),
        ("imageVersion", &config.image_version),
        ("containerName", &config.container_name),
        ("dockerFile", &config.docker_file),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(format!("'{}' must not be empty", key));
        }
    }

    for mount in &config.mount {
        match mount.split_once(':') {
            Some((host, target)) if !host.is_empty() && !target.is_empty() => {}
            _ => return Err(format!("mount '{}' is not of the form host:container", mount)),
        }
    }

    for port in &config.ports {
        if !port_spec().is_match(port) {
            return Err(format!(
                "port '{}' is not of the form [hostIp:][hostPort:]containerPort[/proto]",
                port
            ));
        }
    }

    if let Some(i) = config.post_create_cmds.iter().position(|cmd| cmd.is_empty()) {
        return Err(format!("postCreateCmds entry {} is empty", i));
    }

    Ok(())
}
