//! Mod-folder sweep: discover, validate, and copy the files that pass.
//!
//! ```no_run
//! use ccvalid::sweep::{Sweep, SweepOptions};
//!
//! let opts = SweepOptions { output_dir: Some("clean".into()), ..SweepOptions::default() };
//! let report = Sweep::new(opts).run("Mods")?;
//! println!("{} corrupted", report.corrupted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Validation never writes to disk. Copying happens afterwards, only for
//! files whose verdict is not `corrupted`, and only into `output_dir`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::files::{find_cc_files, CcFile, CcType};
use crate::validator::{PackageValidator, ScriptValidator, Validate, ValidationError};

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("output directory {0} is the sweep root")]
    OutputIsInput(PathBuf),
    #[error("failed to copy {path}: {source}")]
    Copy { path: PathBuf, source: io::Error },
}

// ── SweepOptions ──────────────────────────────────────────────────────────────

/// Configuration for [`Sweep::run`].
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Where passing files are copied, keeping their path below the root.
    /// `None` validates only.
    pub output_dir:    Option<PathBuf>,
    /// Kinds that are not validated. They still count and are still copied
    /// unless `write_skipped` is off.
    pub skip:          Vec<CcType>,
    pub write_skipped: bool,
    /// Validate and report, never copy.
    pub dry_run:       bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            output_dir:    None,
            skip:          Vec::new(),
            write_skipped: true,
            dry_run:       false,
        }
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Passed its validator.
    Valid,
    /// No validator exists for this kind.
    Unchecked,
    /// Kind was in the skip list.
    Skipped,
    Corrupted,
}

/// Verdict for one file: what it is, how it fared, where it went.
#[derive(Debug, Clone, Serialize)]
pub struct FileVerdict {
    pub path:      PathBuf,
    pub kind:      CcType,
    pub status:    Status,
    pub error:     Option<ValidationError>,
    pub copied_to: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub root:        PathBuf,
    pub started_at:  DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Files that passed, were unchecked, or were skipped.
    pub valid:       usize,
    pub corrupted:   usize,
    pub copied:      usize,
    pub by_kind:     BTreeMap<CcType, usize>,
    pub files:       Vec<FileVerdict>,
}

impl SweepReport {
    pub fn has_failures(&self) -> bool {
        self.corrupted > 0
    }

    pub fn count(&self, kind: CcType) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} valid, {} corrupted, {} copied ({} package, {} script, {} image, {} other)",
            self.valid,
            self.corrupted,
            self.copied,
            self.count(CcType::Package),
            self.count(CcType::Script),
            self.count(CcType::Image),
            self.count(CcType::Other),
        )
    }
}

// ── Sweep ─────────────────────────────────────────────────────────────────────

pub struct Sweep {
    opts:    SweepOptions,
    package: PackageValidator,
    script:  ScriptValidator,
}

impl Sweep {
    pub fn new(opts: SweepOptions) -> Self {
        Self { opts, package: PackageValidator, script: ScriptValidator }
    }

    pub fn options(&self) -> &SweepOptions {
        &self.opts
    }

    fn validator_for(&self, kind: CcType) -> Option<&dyn Validate> {
        match kind {
            CcType::Package => Some(&self.package),
            CcType::Script  => Some(&self.script),
            CcType::Image | CcType::Other => None,
        }
    }

    /// Verdict for one file, without copying.
    pub fn evaluate(&self, file: &CcFile) -> FileVerdict {
        let (status, error) = if self.opts.skip.contains(&file.kind) {
            (Status::Skipped, None)
        } else {
            match self.validator_for(file.kind) {
                None => (Status::Unchecked, None),
                Some(v) => match v.validate(&file.path) {
                    Ok(())   => (Status::Valid, None),
                    Err(err) => (Status::Corrupted, Some(err)),
                },
            }
        };
        match &error {
            Some(err) => warn!(file = %file.name, kind = %err.kind, detail = %err.detail, "validation error"),
            None      => info!(file = %file.name, status = ?status, "validated"),
        }
        FileVerdict { path: file.path.clone(), kind: file.kind, status, error, copied_to: None }
    }

    #[cfg(feature = "parallel")]
    fn evaluate_all(&self, files: &[CcFile]) -> Vec<FileVerdict> {
        use rayon::prelude::*;
        files.par_iter().map(|f| self.evaluate(f)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate_all(&self, files: &[CcFile]) -> Vec<FileVerdict> {
        files.iter().map(|f| self.evaluate(f)).collect()
    }

    fn should_copy(&self, verdict: &FileVerdict) -> bool {
        match verdict.status {
            Status::Corrupted => false,
            Status::Skipped   => !self.opts.dry_run && self.opts.write_skipped,
            Status::Valid | Status::Unchecked => !self.opts.dry_run,
        }
    }

    pub fn run<P: AsRef<Path>>(&self, root: P) -> Result<SweepReport, SweepError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(SweepError::NotADirectory(root.to_path_buf()));
        }
        if let Some(out) = &self.opts.output_dir {
            if out.exists() && fs::canonicalize(out)? == fs::canonicalize(root)? {
                return Err(SweepError::OutputIsInput(out.clone()));
            }
        }
        if !self.opts.skip.is_empty() {
            let kinds: Vec<_> = self.opts.skip.iter().map(CcType::as_str).collect();
            info!(skip = ?kinds, "skipping validation");
        }

        let started_at = Utc::now();
        let files = find_cc_files(root);
        let mut verdicts = self.evaluate_all(&files);

        let mut by_kind: BTreeMap<CcType, usize> = CcType::ALL.iter().map(|k| (*k, 0)).collect();
        let mut corrupted = 0;
        let mut copied = 0;
        for (file, verdict) in files.iter().zip(verdicts.iter_mut()) {
            *by_kind.entry(file.kind).or_insert(0) += 1;
            if verdict.status == Status::Corrupted {
                corrupted += 1;
                continue;
            }
            if let Some(out) = &self.opts.output_dir {
                if self.should_copy(verdict) {
                    verdict.copied_to = Some(copy_to_output(file, out)?);
                    copied += 1;
                }
            }
        }

        let report = SweepReport {
            root: root.to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            valid: files.len() - corrupted,
            corrupted,
            copied,
            by_kind,
            files: verdicts,
        };
        info!("{}", report.summary());
        Ok(report)
    }
}

/// Copy `file` below `out_dir`, recreating its path relative to the sweep root.
pub fn copy_to_output(file: &CcFile, out_dir: &Path) -> Result<PathBuf, SweepError> {
    let dest = out_dir.join(&file.relative);
    let copy = || -> io::Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&file.path, &dest)?;
        Ok(())
    };
    copy().map_err(|source| SweepError::Copy { path: file.path.clone(), source })?;
    Ok(dest)
}
