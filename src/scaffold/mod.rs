pub mod check;
pub mod report;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use camino::Utf8Path;
use tracing::{debug, info, warn};

use crate::layout::{EntryKind, Plan, PlannedEntry};
use crate::templates;
use crate::util::fs::{Existing, inspect};

pub use check::check;
pub use report::{Report, Status};

pub const COMPLETION_MESSAGE: &str = "Project structure created successfully!";

#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// Report what would happen without touching the filesystem.
    pub dry_run: bool,
    /// Record failures and continue with the remaining entries.
    pub keep_going: bool,
    /// Write embedded seed contents into newly created files that declare one.
    pub seed: bool,
}

/// Create every directory and file in `plan` that does not exist yet.
///
/// Existing entries are never modified. In the default mode the first
/// failure aborts the run; with `keep_going` it is recorded in the report.
pub fn apply(plan: &Plan, opts: &Options) -> Result<Report> {
    let mut report = Report::new(plan.root.clone(), opts.dry_run);

    for entry in &plan.entries {
        let result = match entry.kind {
            EntryKind::Directory => ensure_dir(entry, opts),
            EntryKind::File => ensure_file(entry, opts),
        };

        match result {
            Ok(status) => report.push(entry.relative.clone(), entry.kind, status, None),
            Err(err) if opts.keep_going => {
                warn!(path = %entry.relative, "{:#}", err);
                report.push(
                    entry.relative.clone(),
                    entry.kind,
                    Status::Failed,
                    Some(format!("{:#}", err)),
                );
            }
            Err(err) => return Err(err),
        }
    }

    Ok(report)
}

fn ensure_dir(entry: &PlannedEntry, opts: &Options) -> Result<Status> {
    match inspect(&entry.path)? {
        Existing::Directory => {
            debug!(path = %entry.relative, "directory exists");
            Ok(Status::Existing)
        }
        Existing::Other => bail!("{} exists but is not a directory", entry.path),
        Existing::Absent if opts.dry_run => Ok(Status::Planned),
        Existing::Absent => {
            fs::create_dir_all(&entry.path)
                .with_context(|| format!("creating directory {}", entry.path))?;
            info!(path = %entry.relative, "created directory");
            Ok(Status::Created)
        }
    }
}

fn ensure_file(entry: &PlannedEntry, opts: &Options) -> Result<Status> {
    match inspect(&entry.path)? {
        Existing::Directory => bail!("{} exists but is a directory", entry.path),
        Existing::Other => {
            debug!(path = %entry.relative, "file exists");
            Ok(Status::Existing)
        }
        Existing::Absent if opts.dry_run => Ok(Status::Planned),
        Existing::Absent => create_file(entry, opts),
    }
}

fn create_file(entry: &PlannedEntry, opts: &Options) -> Result<Status> {
    let contents = match (&entry.seed, opts.seed) {
        (Some(template), true) => templates::get_bytes(template)?,
        _ => Vec::new(),
    };

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&entry.path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            debug!(path = %entry.relative, "file appeared concurrently; leaving it untouched");
            return Ok(Status::Existing);
        }
        Err(err) => return Err(err).with_context(|| format!("creating {}", entry.path)),
    };

    fill_new_file(&mut file, &entry.path, &contents)?;
    info!(path = %entry.relative, seeded = !contents.is_empty(), "created file");
    Ok(Status::Created)
}

/// Write seed contents into a file this run just created. On failure the
/// partial file is removed so a rerun creates it afresh.
fn fill_new_file<W: Write>(writer: &mut W, path: &Utf8Path, contents: &[u8]) -> Result<()> {
    if contents.is_empty() {
        return Ok(());
    }
    if let Err(err) = writer.write_all(contents).and_then(|()| writer.flush()) {
        if let Err(cleanup) = fs::remove_file(path) {
            warn!(%path, error = %cleanup, "could not remove partially written file");
        }
        return Err(err).with_context(|| format!("writing {}", path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;

    use camino::{Utf8Path, Utf8PathBuf};
    use tempfile::TempDir;

    use super::*;
    use crate::layout::Layout;

    fn temp_base() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let base = Utf8Path::from_path(dir.path()).unwrap().to_owned();
        (dir, base)
    }

    fn tree(base: &Utf8Path) -> BTreeSet<Utf8PathBuf> {
        fn walk(base: &Utf8Path, dir: &Utf8Path, out: &mut BTreeSet<Utf8PathBuf>) {
            for entry in dir.read_dir_utf8().unwrap() {
                let entry = entry.unwrap();
                let path = entry.path().to_owned();
                out.insert(path.strip_prefix(base).unwrap().to_owned());
                if entry.file_type().unwrap().is_dir() {
                    walk(base, &path, out);
                }
            }
        }
        let mut out = BTreeSet::new();
        walk(base, base, &mut out);
        out
    }

    #[test]
    fn creates_the_builtin_skeleton_with_empty_files() {
        let (_dir, base) = temp_base();
        let plan = Layout::builtin().plan(&base).unwrap();
        let report = apply(&plan, &Options::default()).unwrap();

        assert!(!report.has_failures());
        assert!(report.entries.iter().all(|e| e.status == Status::Created));
        for entry in plan.directories() {
            assert!(entry.path.is_dir(), "{} is not a directory", entry.path);
        }
        for entry in plan.files() {
            let meta = fs::metadata(&entry.path).unwrap();
            assert!(meta.is_file());
            assert_eq!(meta.len(), 0, "{} is not empty", entry.path);
        }
        assert_eq!(report.completion_line(), COMPLETION_MESSAGE);
    }

    #[test]
    fn creates_nothing_outside_the_plan() {
        let (_dir, base) = temp_base();
        let plan = Layout::builtin().plan(&base).unwrap();
        apply(&plan, &Options::default()).unwrap();

        let expected: BTreeSet<Utf8PathBuf> =
            plan.entries.iter().map(|e| e.relative.clone()).collect();
        assert_eq!(tree(&base), expected);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let (_dir, base) = temp_base();
        let plan = Layout::builtin().plan(&base).unwrap();
        apply(&plan, &Options::default()).unwrap();
        let before = tree(&base);

        let report = apply(&plan, &Options::default()).unwrap();
        assert!(report.entries.iter().all(|e| e.status == Status::Existing));
        assert_eq!(tree(&base), before);
    }

    #[test]
    fn existing_files_are_left_untouched() {
        let (_dir, base) = temp_base();
        let main = base.join("readme_generator/app/main.py");
        fs::create_dir_all(main.parent().unwrap()).unwrap();
        fs::write(&main, "print('hello')\n").unwrap();

        let plan = Layout::builtin().plan(&base).unwrap();
        let report = apply(&plan, &Options { seed: true, ..Options::default() }).unwrap();

        assert_eq!(fs::read_to_string(&main).unwrap(), "print('hello')\n");
        let status = report
            .entries
            .iter()
            .find(|e| e.path == "readme_generator/app/main.py")
            .map(|e| e.status);
        assert_eq!(status, Some(Status::Existing));
        assert_eq!(report.count(EntryKind::Directory, Status::Existing), 2);
    }

    #[test]
    fn seeding_never_overwrites_an_existing_seeded_file() {
        let (_dir, base) = temp_base();
        let gitignore = base.join("readme_generator/.gitignore");
        fs::create_dir_all(gitignore.parent().unwrap()).unwrap();
        fs::write(&gitignore, b"custom\n").unwrap();

        let plan = Layout::builtin().plan(&base).unwrap();
        let report = apply(&plan, &Options { seed: true, ..Options::default() }).unwrap();

        assert_eq!(fs::read(&gitignore).unwrap(), b"custom\n");
        let status = report
            .entries
            .iter()
            .find(|e| e.path == "readme_generator/.gitignore")
            .map(|e| e.status);
        assert_eq!(status, Some(Status::Existing));
        let env = fs::read_to_string(base.join("readme_generator/.env.example")).unwrap();
        assert!(env.contains("GEMINI_API_KEY="));
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_seed_write_removes_the_new_file() {
        let (_dir, base) = temp_base();
        let path = base.join("README.md");
        fs::write(&path, b"").unwrap();

        let err = fill_new_file(&mut BrokenWriter, &path, b"# readme\n").unwrap_err();
        assert!(format!("{:#}", err).contains("disk full"));
        assert!(!path.exists());
    }

    #[test]
    fn empty_contents_skip_the_write() {
        let (_dir, base) = temp_base();
        let path = base.join("empty.py");
        fs::write(&path, b"").unwrap();

        fill_new_file(&mut BrokenWriter, &path, b"").unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let (_dir, base) = temp_base();
        let plan = Layout::builtin().plan(&base).unwrap();
        let report = apply(&plan, &Options { dry_run: true, ..Options::default() }).unwrap();

        assert!(report.entries.iter().all(|e| e.status == Status::Planned));
        assert!(tree(&base).is_empty());
        assert!(report.completion_line().starts_with("Dry run: would create 11 directories and 30 files"));
    }

    #[test]
    fn seeds_only_when_requested() {
        let (_dir, base) = temp_base();
        let plan = Layout::builtin().plan(&base).unwrap();
        apply(&plan, &Options { seed: true, ..Options::default() }).unwrap();

        let gitignore = fs::read_to_string(base.join("readme_generator/.gitignore")).unwrap();
        assert!(gitignore.contains("__pycache__/"));
        let env = fs::read_to_string(base.join("readme_generator/.env.example")).unwrap();
        assert!(env.contains("GEMINI_API_KEY="));
        let service = base.join("readme_generator/app/services/github_service.py");
        assert_eq!(fs::metadata(service).unwrap().len(), 0);

        let (_other, plain) = temp_base();
        let plan = Layout::builtin().plan(&plain).unwrap();
        apply(&plan, &Options::default()).unwrap();
        assert_eq!(fs::metadata(plain.join("readme_generator/.gitignore")).unwrap().len(), 0);
    }

    #[test]
    fn fails_fast_on_kind_conflict() {
        let (_dir, base) = temp_base();
        fs::create_dir_all(base.join("readme_generator/app")).unwrap();
        fs::write(base.join("readme_generator/app/core"), b"not a dir").unwrap();

        let plan = Layout::builtin().plan(&base).unwrap();
        let err = apply(&plan, &Options::default()).unwrap_err();
        assert!(err.to_string().contains("exists but is not a directory"));
        assert!(!base.join("readme_generator/app/services").exists());
    }

    #[test]
    fn keep_going_records_failures_and_continues() {
        let (_dir, base) = temp_base();
        fs::create_dir_all(base.join("readme_generator/app")).unwrap();
        fs::write(base.join("readme_generator/app/core"), b"not a dir").unwrap();

        let plan = Layout::builtin().plan(&base).unwrap();
        let report = apply(&plan, &Options { keep_going: true, ..Options::default() }).unwrap();

        let failed: Vec<&str> = report.failures().map(|e| e.path.as_str()).collect();
        assert!(failed.contains(&"readme_generator/app/core"));
        assert!(failed.contains(&"readme_generator/app/core/__init__.py"));
        assert!(base.join("readme_generator/app/services/github_service.py").is_file());
        assert!(report.failure_summary().contains("entries failed"));
    }

    #[test]
    fn directory_in_place_of_file_is_an_error() {
        let (_dir, base) = temp_base();
        fs::create_dir_all(base.join("readme_generator/app/main.py")).unwrap();

        let plan = Layout::builtin().plan(&base).unwrap();
        let err = apply(&plan, &Options::default()).unwrap_err();
        assert!(err.to_string().contains("exists but is a directory"));
    }
}
