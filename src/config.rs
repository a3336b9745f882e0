//! Configuration management for hatch.
//!
//! Values come from the environment. `main` loads an optional `.env` with
//! dotenvy first, so real environment variables take precedence over it.

use std::collections::HashMap;
use std::path::PathBuf;

/// Default repository of the Swift toolchain images.
pub const DEFAULT_DOCKER_IMAGE: &str = "qutheory/swift";

/// Default location of the Dockerfile template.
pub const DEFAULT_DOCKERFILE_URL: &str = "docker.qutheory.io";

/// Default mount point of the project inside the container.
pub const DEFAULT_CONTAINER_DIR: &str = "/vapor";

/// Default published port mapping for `docker run`.
pub const DEFAULT_CONTAINER_PORT: &str = "8080:8080";

/// Hatch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Working directory override (HATCH_TEST_DIRECTORY). Skips the `pwd` probe.
    pub test_directory: Option<PathBuf>,
    /// Image repository; the tag is the pinned Swift version.
    pub docker_image: String,
    pub dockerfile_url: String,
    pub container_dir: String,
    pub container_port: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a fixed set of variables.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            test_directory: lookup("HATCH_TEST_DIRECTORY")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            docker_image: get("HATCH_DOCKER_IMAGE", DEFAULT_DOCKER_IMAGE),
            dockerfile_url: get("HATCH_DOCKERFILE_URL", DEFAULT_DOCKERFILE_URL),
            container_dir: get("HATCH_CONTAINER_DIR", DEFAULT_CONTAINER_DIR),
            container_port: get("HATCH_CONTAINER_PORT", DEFAULT_CONTAINER_PORT),
        }
    }

    /// Render configuration for `hatch config`.
    pub fn describe(&self) -> Vec<String> {
        let test_directory = self
            .test_directory
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(unset, using pwd)".to_string());
        vec![
            format!("  HATCH_TEST_DIRECTORY: {}", test_directory),
            format!("  HATCH_DOCKER_IMAGE: {}", self.docker_image),
            format!("  HATCH_DOCKERFILE_URL: {}", self.dockerfile_url),
            format!("  HATCH_CONTAINER_DIR: {}", self.container_dir),
            format!("  HATCH_CONTAINER_PORT: {}", self.container_port),
        ]
    }
}
