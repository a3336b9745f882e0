//! Shared test utilities for hatch tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use hatch::commands::{self, Context};
use hatch::config::Config;
use hatch::process::Runner;
use hatch::router::{self, Outcome};
use tempfile::TempDir;

/// Test environment: a temporary project directory used as the cwd override.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Project root simulation
    pub project: PathBuf,
    pub config: Config,
}

/// Result of routing one command line in-process.
pub struct Routed {
    pub result: anyhow::Result<Outcome>,
    pub output: String,
    /// Processes spawned while routing.
    pub launches: usize,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let project = temp_dir.path().join("project");
        fs::create_dir_all(&project).expect("Failed to create project dir");

        let vars = HashMap::from([(
            "HATCH_TEST_DIRECTORY".to_string(),
            project.display().to_string(),
        )]);
        let config = Config::from_vars(&vars);

        Self {
            _temp_dir: temp_dir,
            project,
            config,
        }
    }

    /// Route `args` through the real command tree with captured output.
    pub fn route(&self, args: &[&str]) -> Routed {
        self.route_with(&self.config, args)
    }

    /// Route `args` with an explicit configuration.
    pub fn route_with(&self, config: &Config, args: &[&str]) -> Routed {
        let runner = Runner::new();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let tree = commands::tree();
        let mut out = Vec::new();

        let result = {
            let mut ctx = Context::new(&runner, config, &mut out);
            router::route(&tree, &args, &mut ctx)
        };

        Routed {
            result,
            output: String::from_utf8(out).expect("output is utf-8"),
            launches: runner.launches(),
        }
    }

    /// Run the built binary inside the project directory.
    pub fn run_binary(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_hatch"))
            .args(args)
            .current_dir(&self.project)
            .env("HATCH_TEST_DIRECTORY", &self.project)
            .env_remove("HATCH_LOG")
            .output()
            .expect("Failed to run hatch binary")
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.project.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, contents).expect("Failed to write file");
        path
    }

    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.project.join(relative);
        fs::create_dir_all(&path).expect("Failed to create dir");
        path
    }
}

/// Assert that a path exists.
pub fn assert_exists(path: &Path) {
    assert!(path.exists(), "Expected path to exist: {}", path.display());
}

/// Assert that a path is gone.
pub fn assert_missing(path: &Path) {
    assert!(!path.exists(), "Expected path to be removed: {}", path.display());
}
