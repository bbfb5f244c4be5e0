//! Registry server configuration.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! command-line flags (see [`crate::cli`]). A YAML file may set any subset of:
//!
//! ```yaml
//! bind_addr: 127.0.0.1:9000
//! document_ttl: 30m
//! patch_paths:
//!   - /etc/indicator-registry/patches
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicator_core::Patch;
use serde::Deserialize;
use tracing::info;

use crate::error::{RegistryError, RegistryResult};

/// Default time a registered document stays visible.
pub const DEFAULT_DOCUMENT_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Configuration for the registry server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// How long a registration stays visible.
    pub document_ttl: Duration,
    /// Patch files or directories applied to every registration.
    pub patch_paths: Vec<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            document_ttl: DEFAULT_DOCUMENT_TTL,
            patch_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryConfigOverride {
    bind_addr: Option<String>,
    document_ttl: Option<String>,
    patch_paths: Option<Vec<PathBuf>>,
}

impl RegistryConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the document time to live.
    #[must_use]
    pub const fn with_document_ttl(mut self, ttl: Duration) -> Self {
        self.document_ttl = ttl;
        self
    }

    /// Add a patch file or directory.
    #[must_use]
    pub fn with_patch_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.patch_paths.push(path.into());
        self
    }

    /// Overlays the settings present in a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Config`] if the file cannot be read or holds
    /// an invalid value.
    pub fn with_yaml_file(self, path: &Path) -> RegistryResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            RegistryError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        self.with_yaml(&contents)
            .map_err(|e| RegistryError::Config(format!("{}: {e}", path.display())))
    }

    /// Overlays the settings present in a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Config`] if the YAML is malformed or holds an
    /// invalid value.
    pub fn with_yaml(mut self, contents: &str) -> RegistryResult<Self> {
        let overrides: RegistryConfigOverride = if contents.trim().is_empty() {
            RegistryConfigOverride::default()
        } else {
            serde_yaml::from_str(contents)
                .map_err(|e| RegistryError::Config(format!("invalid config: {e}")))?
        };

        if let Some(value) = overrides.bind_addr {
            self.bind_addr = parse_bind_addr(&value)?;
        }
        if let Some(value) = overrides.document_ttl {
            self.document_ttl = parse_ttl(&value)?;
        }
        if let Some(paths) = overrides.patch_paths {
            self.patch_paths = paths;
        }
        Ok(self)
    }

    /// Reads every configured patch, in configuration order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Config`] if any patch file cannot be loaded.
    pub fn load_patches(&self) -> RegistryResult<Vec<Patch>> {
        let patches = indicator_core::load_patches(&self.patch_paths)
            .map_err(|e| RegistryError::Config(e.to_string()))?;
        info!(
            paths = self.patch_paths.len(),
            patches = patches.len(),
            "loaded patches"
        );
        Ok(patches)
    }
}

/// Parses a listen address.
///
/// # Errors
///
/// Returns [`RegistryError::Config`] for anything that is not `host:port`.
pub fn parse_bind_addr(value: &str) -> RegistryResult<SocketAddr> {
    value
        .trim()
        .parse()
        .map_err(|e| RegistryError::Config(format!("invalid bind address '{value}': {e}")))
}

/// Parses a duration like `30s`, `5m`, `2h` or `1500ms`. Bare numbers are
/// seconds.
#[must_use]
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(num) = value.strip_suffix("ms") {
        return num.trim().parse().ok().map(Duration::from_millis);
    }
    if let Some(num) = value.strip_suffix('s') {
        return num.trim().parse().ok().map(Duration::from_secs);
    }
    if let Some(num) = value.strip_suffix('m') {
        return num
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(60))
            .map(Duration::from_secs);
    }
    if let Some(num) = value.strip_suffix('h') {
        return num
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(60 * 60))
            .map(Duration::from_secs);
    }

    value.parse().ok().map(Duration::from_secs)
}

/// Parses a document TTL, rejecting zero.
///
/// # Errors
///
/// Returns [`RegistryError::Config`] if the value is not a positive
/// duration.
pub fn parse_ttl(value: &str) -> RegistryResult<Duration> {
    match parse_duration(value) {
        Some(ttl) if !ttl.is_zero() => Ok(ttl),
        _ => Err(RegistryError::Config(format!(
            "invalid document ttl '{value}': expected a positive duration such as 30m or 2h"
        ))),
    }
}
