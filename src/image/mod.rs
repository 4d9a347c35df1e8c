//! Image building and tagging
//!
//! The runtime only guarantees human-readable build output, so a build
//! runs twice with identical arguments: once with progress for the user,
//! then quietly to recover the image digest from the warm cache.

use std::path::Path;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::ResolvedConfig;
use crate::error::{DevDockerError, Result};
use crate::runtime::{BuildRequest, ContainerRuntime};

/// Hex characters of the digest kept in generated versions
const DIGEST_FRAGMENT_LEN: usize = 12;

fn digest_pattern() -> &'static Regex {
    static DIGEST: OnceLock<Regex> = OnceLock::new();
    DIGEST.get_or_init(|| Regex::new(r"sha256:[0-9a-f]{64}").expect("digest pattern is valid"))
}

/// Build `request` and return the resulting content digest
pub fn build<R: ContainerRuntime + ?Sized>(runtime: &R, request: &BuildRequest) -> Result<String> {
    log::info!("Building {}", request.docker_file.display());
    runtime.build(request)?;
    let quiet = runtime.build_quiet(request)?;
    parse_digest(&quiet)
}

/// Pick the last digest printed by a quiet build
pub fn parse_digest(output: &str) -> Result<String> {
    digest_pattern()
        .find_iter(output)
        .last()
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| DevDockerError::UnexpectedOutput {
            command: "build -q".to_string(),
            message: format!("no image digest in {:?}", output.trim()),
        })
}

/// Leading hex characters of a digest, without the algorithm prefix
pub fn digest_fragment(digest: &str) -> &str {
    let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
    &hex[..hex.len().min(DIGEST_FRAGMENT_LEN)]
}

/// `<YYYYMMDD>-<digest fragment>`
pub fn generate_version(date: NaiveDate, digest: &str) -> String {
    format!("{}-{}", date.format("%Y%m%d"), digest_fragment(digest))
}

/// Outcome of `mkimg`, for reporting to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReport {
    pub digest: String,
    pub version: String,
    pub tag: String,
    pub retagged: bool,
}

impl ImageReport {
    /// Command publishing the tag with the given runtime binary
    pub fn push_command(&self, runtime_binary: &str) -> String {
        format!("{} push {}", runtime_binary, self.tag)
    }

    /// Config change needed to adopt a freshly generated version
    pub fn config_edit(&self) -> Option<String> {
        if self.retagged {
            None
        } else {
            Some(format!("imageVersion = \"{}\"", self.version))
        }
    }
}

/// Build the project image from its declared definition file and tag it.
///
/// With `retag` the digest gets the configured version, reproducing a
/// historical image under its original tag. Otherwise a new version is
/// generated from `today` and the digest.
pub fn mkimg<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    resolved: &ResolvedConfig,
    retag: bool,
    today: NaiveDate,
) -> Result<ImageReport> {
    let docker_file = resolved.docker_file_path();
    let context_dir = docker_file
        .parent()
        .unwrap_or_else(|| Path::new("/"))
        .to_path_buf();

    let request = BuildRequest {
        context_dir,
        docker_file,
        build_args: Vec::new(),
    };
    let digest = build(runtime, &request)?;

    let version = if retag {
        resolved.config.image_version.clone()
    } else {
        generate_version(today, &digest)
    };
    let tag = resolved.tag_for(&version);

    log::info!("Tagging {} as {}", digest, tag);
    runtime.tag(&digest, &tag)?;

    Ok(ImageReport {
        digest,
        version,
        tag,
        retagged: retag,
    })
}
