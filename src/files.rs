//! Mod-folder discovery and classification by extension.

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

pub const PACKAGE_EXTENSIONS: &[&str] = &["package"];
/// `t4script` is a common misspelling seen in the wild.
pub const SCRIPT_EXTENSIONS:  &[&str] = &["ts4script", "t4script"];
pub const IMAGE_EXTENSIONS:   &[&str] = &["png", "jpg", "jpeg", "gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CcType {
    Package,
    Script,
    Image,
    Other,
}

impl CcType {
    pub const ALL: [CcType; 4] = [CcType::Package, CcType::Script, CcType::Image, CcType::Other];

    /// Classify by extension, ASCII case-insensitively.
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return CcType::Other;
        };
        let matches = |set: &[&str]| set.iter().any(|known| ext.eq_ignore_ascii_case(known));
        if matches(PACKAGE_EXTENSIONS) {
            CcType::Package
        } else if matches(SCRIPT_EXTENSIONS) {
            CcType::Script
        } else if matches(IMAGE_EXTENSIONS) {
            CcType::Image
        } else {
            CcType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CcType::Package => "package",
            CcType::Script  => "script",
            CcType::Image   => "image",
            CcType::Other   => "other",
        }
    }
}

impl fmt::Display for CcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered file. `relative` is the path below the sweep root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CcFile {
    pub path:     PathBuf,
    pub relative: PathBuf,
    pub name:     String,
    pub kind:     CcType,
    pub size:     u64,
}

impl CcFile {
    pub fn new(root: &Path, path: PathBuf, size: u64) -> Self {
        let relative = path.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| {
            PathBuf::from(path.file_name().unwrap_or_default())
        });
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kind = CcType::from_path(&path);
        Self { path, relative, name, kind, size }
    }
}

/// Find every regular file below `dir`, each exactly once, sorted by path.
///
/// Unreadable entries are logged and skipped rather than aborting the walk.
pub fn find_cc_files<P: AsRef<Path>>(dir: P) -> Vec<CcFile> {
    let root = dir.as_ref();
    let mut files: Vec<CcFile> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let size = e.metadata().map(|m| m.len()).unwrap_or(0);
            CcFile::new(root, e.into_path(), size)
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}
