use std::fmt::Write as _;

use anyhow::Result;
use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::debug;

use crate::layout::{EntryKind, Plan};
use crate::util::fs::{Existing, inspect};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Present,
    Missing,
    /// Something of the other kind occupies the path.
    Conflict,
}

#[derive(Clone, Debug, Serialize)]
pub struct CheckEntry {
    pub path: Utf8PathBuf,
    pub kind: EntryKind,
    pub state: State,
}

#[derive(Clone, Debug, Serialize)]
pub struct CheckReport {
    pub root: Utf8PathBuf,
    pub entries: Vec<CheckEntry>,
}

impl CheckReport {
    pub fn problems(&self) -> impl Iterator<Item = &CheckEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.state != State::Present)
    }

    pub fn is_complete(&self) -> bool {
        self.problems().next().is_none()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if self.is_complete() {
            let _ = write!(
                out,
                "All {} entries present under {}",
                self.entries.len(),
                self.root
            );
            return out;
        }

        for entry in self.problems() {
            let label = match entry.state {
                State::Missing => "missing ",
                State::Conflict => "conflict",
                State::Present => continue,
            };
            let _ = writeln!(out, "  {} {} ({})", label, entry.path, entry.kind.as_str());
        }
        out.truncate(out.trim_end().len());
        out
    }

    pub fn failure_summary(&self) -> String {
        format!(
            "{} of {} entries missing or conflicting under {}",
            self.problems().count(),
            self.entries.len(),
            self.root
        )
    }
}

/// Compare a plan against the filesystem without modifying anything.
pub fn check(plan: &Plan) -> Result<CheckReport> {
    let mut entries = Vec::with_capacity(plan.entries.len());
    for entry in &plan.entries {
        let state = match (entry.kind, inspect(&entry.path)?) {
            (_, Existing::Absent) => State::Missing,
            (EntryKind::Directory, Existing::Directory) => State::Present,
            (EntryKind::File, Existing::Other) => State::Present,
            _ => State::Conflict,
        };
        debug!(path = %entry.relative, ?state, "checked");
        entries.push(CheckEntry {
            path: entry.relative.clone(),
            kind: entry.kind,
            state,
        });
    }

    Ok(CheckReport {
        root: plan.root.clone(),
        entries,
    })
}
