use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Raw tables a synthesis run leaves behind.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RawFileKind {
    CircuitScore,
    ActivityTable,
    PartInformation,
}

impl RawFileKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            RawFileKind::CircuitScore => "circuit-score.csv",
            RawFileKind::ActivityTable => "activity-table.csv",
            RawFileKind::PartInformation => "part-information.csv",
        }
    }

    pub fn classify(file_name: &str) -> Option<Self> {
        RawFileKind::iter().find(|k| file_name.ends_with(k.suffix()))
    }
}

pub type RawFiles = BTreeMap<RawFileKind, PathBuf>;

/// Walks `dir` for known raw tables. The first match in file-name order wins.
pub fn discover<P: AsRef<Path>>(dir: P) -> RawFiles {
    let dir = dir.as_ref();
    let mut found = RawFiles::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("⚠️  Skipping unreadable output entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(kind) = entry.file_name().to_str().and_then(RawFileKind::classify) else {
            continue;
        };
        found.entry(kind).or_insert_with(|| {
            debug!("Found {} at {}", kind, entry.path().display());
            entry.path().to_path_buf()
        });
    }
    found
}

/// Files the collaborator reported, completed by discovery in `dir`.
pub fn resolve<P: AsRef<Path>>(reported: &RawFiles, dir: P) -> RawFiles {
    let mut files = reported.clone();
    if RawFileKind::iter().all(|k| files.contains_key(&k)) {
        return files;
    }
    for (kind, path) in discover(dir) {
        files.entry(kind).or_insert(path);
    }
    files
}
