//! Build artifact cleaning.
//!
//! Each step probes the filesystem, then acts or reports why it did not.
//! Steps never abort each other: every step's result ends up in the report.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::process::{Cmd, Runner};

/// Reason given when the lockfile is left alone.
pub const RESOLVED_DECLINE_REASON: &str = "use [--update,-u] flag to remove this file during clean";

/// Result of a single cleanup step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanResult {
    /// Nothing to clean.
    Skipped,
    Succeeded,
    Failed(String),
    /// Target present, but a flag keeps it.
    Declined(String),
}

impl CleanResult {
    pub fn label(&self) -> &'static str {
        match self {
            CleanResult::Skipped => "SKIP",
            CleanResult::Succeeded => "DONE",
            CleanResult::Failed(_) => "FAIL",
            CleanResult::Declined(_) => "KEPT",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            CleanResult::Skipped => "nothing to clean",
            CleanResult::Succeeded => "cleaned file",
            CleanResult::Failed(msg) => msg,
            CleanResult::Declined(reason) => reason,
        }
    }
}

/// Flags of `hatch clean`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    /// Also remove Package.resolved.
    pub update: bool,
    /// Keep `.build/checkouts`.
    pub keep_checkouts: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRow {
    pub name: &'static str,
    pub result: CleanResult,
}

/// Results of all cleanup steps, in the order they ran.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub rows: Vec<CleanRow>,
}

#[derive(Serialize)]
struct JsonRow<'a> {
    name: &'a str,
    status: &'a str,
    detail: &'a str,
}

impl CleanReport {
    pub fn result(&self, name: &str) -> Option<&CleanResult> {
        self.rows.iter().find(|r| r.name == name).map(|r| &r.result)
    }

    pub fn failed_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r.result, CleanResult::Failed(_)))
            .count()
    }

    pub fn cleaned_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.result == CleanResult::Succeeded)
            .count()
    }

    /// Render as an aligned table with a summary line.
    pub fn render_table(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0)
            .max("Target".len());

        let mut text = String::new();
        let _ = writeln!(text, "{:width$}  {:6}  {}", "Target", "Status", "Detail");
        for row in &self.rows {
            let _ = writeln!(
                text,
                "{:width$}  {:6}  {}",
                row.name,
                row.result.label(),
                row.result.detail()
            );
        }
        let _ = writeln!(
            text,
            "\nSummary: {} cleaned, {} failed",
            self.cleaned_count(),
            self.failed_count()
        );
        text
    }

    pub fn render_json(&self) -> Result<String> {
        let rows: Vec<JsonRow<'_>> = self
            .rows
            .iter()
            .map(|r| JsonRow {
                name: r.name,
                status: r.result.label(),
                detail: r.result.detail(),
            })
            .collect();
        Ok(serde_json::to_string_pretty(&rows)?)
    }
}

type Step<'a> = fn(&Cleaner<'a>) -> Result<CleanResult>;

/// Runs every cleanup step against one project directory.
pub struct Cleaner<'a> {
    runner: &'a Runner,
    cwd: PathBuf,
    home: Option<PathBuf>,
    options: CleanOptions,
}

impl<'a> Cleaner<'a> {
    /// Cleaner for the current (or overridden) working directory.
    pub fn new(runner: &'a Runner, config: &Config, options: CleanOptions) -> Result<Self> {
        let cwd = runner
            .cwd(config.test_directory.as_deref())
            .context("Failed to determine working directory")?;
        Ok(Self::with_dirs(runner, cwd, dirs::home_dir(), options))
    }

    pub fn with_dirs(
        runner: &'a Runner,
        cwd: PathBuf,
        home: Option<PathBuf>,
        options: CleanOptions,
    ) -> Self {
        Self {
            runner,
            cwd,
            home,
            options,
        }
    }

    /// Steps in the order they run. Xcode steps exist only on macOS.
    fn steps(&self) -> Vec<(&'static str, Step<'a>)> {
        let mut steps: Vec<(&'static str, Step<'a>)> = Vec::new();
        if cfg!(target_os = "macos") {
            steps.push(("DerivedData", Cleaner::clean_derived_data));
            steps.push(("xcodeproj", Cleaner::clean_xcodeproj));
        }
        steps.push((".build", Cleaner::clean_build_folder));
        steps.push(("Package.resolved", Cleaner::clean_package_resolved));
        steps
    }

    /// Run all steps. Individual failures become `Failed` rows.
    pub fn run(&self) -> CleanReport {
        let rows = self
            .steps()
            .into_iter()
            .map(|(name, step)| {
                info!(step = name, "cleaning");
                let result = step(self).unwrap_or_else(|err| {
                    warn!(step = name, error = %format!("{err:#}"), "cleanup step failed");
                    CleanResult::Failed(format!("{err:#}"))
                });
                CleanRow { name, result }
            })
            .collect();
        CleanReport { rows }
    }

    fn clean_package_resolved(&self) -> Result<CleanResult> {
        let resolved = self.cwd.join("Package.resolved");
        if !present(&resolved) {
            return Ok(CleanResult::Skipped);
        }
        if !self.options.update {
            return Ok(CleanResult::Declined(RESOLVED_DECLINE_REASON.to_string()));
        }
        remove_path(&resolved)?;
        Ok(CleanResult::Succeeded)
    }

    fn clean_build_folder(&self) -> Result<CleanResult> {
        let build = self.cwd.join(".build");
        if !present(&build) {
            return Ok(CleanResult::Skipped);
        }
        if self.options.keep_checkouts {
            let entries = fs::read_dir(&build)
                .with_context(|| format!("Failed to read {}", build.display()))?;
            for entry in entries {
                let entry = entry?;
                if entry.file_name() == "checkouts" {
                    continue;
                }
                remove_path(&entry.path())?;
            }
        } else {
            remove_path(&build)?;
        }
        Ok(CleanResult::Succeeded)
    }

    fn clean_xcodeproj(&self) -> Result<CleanResult> {
        let projects = self.xcode_projects()?;
        if projects.is_empty() {
            return Ok(CleanResult::Skipped);
        }
        for project in projects {
            remove_path(&project)?;
        }
        Ok(CleanResult::Succeeded)
    }

    fn clean_derived_data(&self) -> Result<CleanResult> {
        if let Some(home) = &self.home {
            let default_location = home.join("Library/Developer/Xcode/DerivedData");
            if present(&default_location) {
                remove_path(&default_location)?;
                return Ok(CleanResult::Succeeded);
            }
        }

        let relative = self.cwd.join("DerivedData");
        if present(&relative) {
            remove_path(&relative)?;
            return Ok(CleanResult::Succeeded);
        }

        if self.xcode_projects()?.is_empty() {
            return Ok(CleanResult::Skipped);
        }
        let settings = self.runner.captured(
            &Cmd::new("xcodebuild")
                .arg("-showBuildSettings")
                .dir(&self.cwd),
        )?;
        let Some(location) = derived_data_from_build_settings(&settings) else {
            bail!("Could not determine DerivedData location from xcodebuild");
        };
        if !present(&location) {
            return Ok(CleanResult::Skipped);
        }
        remove_path(&location)?;
        Ok(CleanResult::Succeeded)
    }

    fn xcode_projects(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.cwd)
            .with_context(|| format!("Failed to read {}", self.cwd.display()))?;
        let mut projects = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "xcodeproj") {
                projects.push(path);
            }
        }
        Ok(projects)
    }
}

/// Per-project DerivedData directory: the parent of the `Build` component of
/// `BUILD_DIR` in `xcodebuild -showBuildSettings` output.
pub fn derived_data_from_build_settings(settings: &str) -> Option<PathBuf> {
    let build_dir = settings.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        (key.trim() == "BUILD_DIR").then(|| PathBuf::from(value.trim()))
    })?;
    build_dir
        .ancestors()
        .find(|p| p.file_name().is_some_and(|n| n == "Build"))
        .and_then(Path::parent)
        .map(Path::to_path_buf)
}

/// Remove a file, symlink or directory tree.
/// Whether anything, including a dangling symlink, sits at `path`.
fn present(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn remove_path(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.with_context(|| format!("Failed to remove {}", path.display()))
}
