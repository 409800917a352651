use std::fmt::Write as _;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::layout::EntryKind;

use super::COMPLETION_MESSAGE;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Created,
    Existing,
    Planned,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntryReport {
    pub path: Utf8PathBuf,
    pub kind: EntryKind,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one `init` run, one record per planned entry.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub root: Utf8PathBuf,
    pub dry_run: bool,
    pub entries: Vec<EntryReport>,
}

impl Report {
    pub fn new(root: Utf8PathBuf, dry_run: bool) -> Self {
        Self {
            root,
            dry_run,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, path: Utf8PathBuf, kind: EntryKind, status: Status, error: Option<String>) {
        self.entries.push(EntryReport {
            path,
            kind,
            status,
            error,
        });
    }

    pub fn count(&self, kind: EntryKind, status: Status) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind && entry.status == status)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries
            .iter()
            .filter(|entry| entry.status == Status::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn failure_summary(&self) -> String {
        let mut out = String::new();
        let failed = self.failures().count();
        let _ = write!(
            out,
            "{} of {} entries failed under {}",
            failed,
            self.entries.len(),
            self.root
        );
        for entry in self.failures() {
            let _ = write!(
                out,
                "\n  {} {}: {}",
                entry.kind.as_str(),
                entry.path,
                entry.error.as_deref().unwrap_or("unknown error")
            );
        }
        out
    }

    /// The single line printed once every entry has been attempted.
    pub fn completion_line(&self) -> String {
        if !self.dry_run {
            return COMPLETION_MESSAGE.to_owned();
        }
        format!(
            "Dry run: would create {} directories and {} files under {} ({} already present)",
            self.count(EntryKind::Directory, Status::Planned),
            self.count(EntryKind::File, Status::Planned),
            self.root,
            self.count(EntryKind::Directory, Status::Existing)
                + self.count(EntryKind::File, Status::Existing),
        )
    }
}
