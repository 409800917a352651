use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::templates;

pub const DEFAULT_ROOT: &str = "readme_generator";

const BUILTIN_DIRECTORIES: &[&str] = &[
    "app",
    "app/api",
    "app/api/routes",
    "app/core",
    "app/services",
    "app/schemas",
    "app/utils",
    "tests",
    "tests/test_api",
    "tests/test_services",
];

const BUILTIN_FILES: &[&str] = &[
    ".env.example",
    ".gitignore",
    "pyproject.toml",
    "README.md",
    "requirements.txt",
    "app/__init__.py",
    "app/main.py",
    "app/config.py",
    "app/api/__init__.py",
    "app/api/routes/__init__.py",
    "app/api/routes/auth.py",
    "app/api/routes/readme.py",
    "app/core/__init__.py",
    "app/core/security.py",
    "app/services/__init__.py",
    "app/services/github_service.py",
    "app/services/gemini_service.py",
    "app/schemas/__init__.py",
    "app/schemas/auth.py",
    "app/schemas/readme.py",
    "app/utils/__init__.py",
    "app/utils/markdown_utils.py",
    "tests/__init__.py",
    "tests/conftest.py",
    "tests/test_api/__init__.py",
    "tests/test_api/test_auth.py",
    "tests/test_api/test_readme.py",
    "tests/test_services/__init__.py",
    "tests/test_services/test_github_service.py",
    "tests/test_services/test_gemini_service.py",
];

const BUILTIN_SEEDS: &[(&str, &str)] = &[
    (".env.example", "python/env.example"),
    (".gitignore", "python/gitignore"),
    ("pyproject.toml", "python/pyproject.toml"),
    ("README.md", "python/README.md"),
    ("requirements.txt", "python/requirements.txt"),
];

/// Declarative project skeleton, as stored in a layout TOML file.
///
/// Entry paths are relative to `root`, which is itself relative to the
/// directory the scaffold runs in.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    pub root: String,
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub seeds: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Directory,
    File,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Directory => "directory",
            EntryKind::File => "file",
        }
    }
}

/// A single path the scaffold is responsible for.
#[derive(Clone, Debug, Serialize)]
pub struct PlannedEntry {
    /// Path relative to the base directory, root included.
    pub relative: Utf8PathBuf,
    #[serde(skip)]
    pub path: Utf8PathBuf,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
}

/// A layout resolved against a base directory. Directories come first,
/// parents before children, then files in declaration order.
#[derive(Clone, Debug, Serialize)]
pub struct Plan {
    pub base: Utf8PathBuf,
    pub root: Utf8PathBuf,
    pub entries: Vec<PlannedEntry>,
}

impl Plan {
    pub fn directories(&self) -> impl Iterator<Item = &PlannedEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Directory)
    }

    pub fn files(&self) -> impl Iterator<Item = &PlannedEntry> {
        self.entries.iter().filter(|entry| entry.kind == EntryKind::File)
    }

    /// Entries in depth-first order, suitable for printing as a tree.
    pub fn tree_order(&self) -> Vec<&PlannedEntry> {
        let mut ordered: Vec<&PlannedEntry> = self.entries.iter().collect();
        ordered.sort_by(|a, b| a.relative.cmp(&b.relative));
        ordered
    }
}

impl Layout {
    /// The fixed `readme_generator/` skeleton.
    pub fn builtin() -> Self {
        Self {
            root: DEFAULT_ROOT.to_owned(),
            directories: BUILTIN_DIRECTORIES.iter().map(|s| (*s).to_owned()).collect(),
            files: BUILTIN_FILES.iter().map(|s| (*s).to_owned()).collect(),
            seeds: BUILTIN_SEEDS
                .iter()
                .map(|(file, template)| ((*file).to_owned(), (*template).to_owned()))
                .collect(),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let layout: Layout = toml::from_str(raw).context("parsing layout")?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing layout")
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.root = root.to_owned();
        self
    }

    /// Reject layouts that cannot be scaffolded unambiguously.
    pub fn validate(&self) -> Result<()> {
        normalize_root(&self.root)?;

        let mut kinds: HashMap<Utf8PathBuf, EntryKind> = HashMap::new();
        for (raw, kind) in self.raw_entries() {
            let path = normalize_entry(raw)?;
            if let Some(previous) = kinds.insert(path.clone(), kind) {
                if previous == kind {
                    bail!("`{}` is listed more than once", path);
                }
                bail!("`{}` is listed as both a file and a directory", path);
            }
        }

        for path in kinds.keys() {
            for ancestor in path.ancestors().skip(1) {
                if kinds.get(ancestor) == Some(&EntryKind::File) {
                    bail!("`{}` is nested under `{}`, which is a file", path, ancestor);
                }
            }
        }

        for (file, template) in &self.seeds {
            let path = normalize_entry(file)?;
            if kinds.get(&path) != Some(&EntryKind::File) {
                bail!("seed for `{}` does not name a listed file", file);
            }
            if !templates::exists(template) {
                bail!("seed template `{}` for `{}` is not available", template, file);
            }
        }

        Ok(())
    }

    /// Resolve the layout into the ordered set of paths to create under `base`.
    pub fn plan(&self, base: &Utf8Path) -> Result<Plan> {
        self.validate()?;
        let root = normalize_root(&self.root)?;

        let seeds: HashMap<Utf8PathBuf, &str> = self
            .seeds
            .iter()
            .map(|(file, template)| -> Result<(Utf8PathBuf, &str)> {
                Ok((normalize_entry(file)?, template.as_str()))
            })
            .collect::<Result<_>>()?;

        let mut directories: BTreeSet<Utf8PathBuf> = BTreeSet::new();
        let mut files: Vec<(Utf8PathBuf, Option<String>)> = Vec::new();

        for (raw, kind) in self.raw_entries() {
            let entry = normalize_entry(raw)?;
            let seed = seeds.get(&entry).map(|template| (*template).to_owned());
            let relative = root.join(&entry);
            let mut ancestors = relative.ancestors();
            if kind == EntryKind::File {
                ancestors.next();
                files.push((relative.clone(), seed));
            }
            for ancestor in ancestors {
                insert_dir(&mut directories, ancestor);
            }
        }
        for ancestor in root.ancestors() {
            insert_dir(&mut directories, ancestor);
        }

        let mut entries = Vec::with_capacity(directories.len() + files.len());
        for relative in directories {
            entries.push(PlannedEntry {
                path: base.join(&relative),
                relative,
                kind: EntryKind::Directory,
                seed: None,
            });
        }
        for (relative, seed) in files {
            entries.push(PlannedEntry {
                path: base.join(&relative),
                relative,
                kind: EntryKind::File,
                seed,
            });
        }

        Ok(Plan {
            base: base.to_owned(),
            root: base.join(&root),
            entries,
        })
    }

    fn raw_entries(&self) -> impl Iterator<Item = (&str, EntryKind)> {
        self.directories
            .iter()
            .map(|dir| (dir.as_str(), EntryKind::Directory))
            .chain(self.files.iter().map(|file| (file.as_str(), EntryKind::File)))
    }
}

fn insert_dir(directories: &mut BTreeSet<Utf8PathBuf>, path: &Utf8Path) {
    if !path.as_str().is_empty() {
        directories.insert(path.to_owned());
    }
}

/// Normalize a layout entry: relative, no `..`, `.` segments dropped.
pub fn normalize_entry(raw: &str) -> Result<Utf8PathBuf> {
    let path = normalize(raw)?;
    if path.as_str().is_empty() {
        bail!("layout entry `{}` does not name a path", raw);
    }
    Ok(path)
}

/// Like [`normalize_entry`], but `.` (the base directory itself) is allowed.
pub fn normalize_root(raw: &str) -> Result<Utf8PathBuf> {
    normalize(raw).with_context(|| format!("invalid root `{}`", raw))
}

fn normalize(raw: &str) -> Result<Utf8PathBuf> {
    if raw.contains('\0') {
        return Err(anyhow!("layout path `{}` contains a NUL byte", raw.escape_debug()));
    }

    let mut normalized = Utf8PathBuf::new();
    for component in Utf8Path::new(raw).components() {
        match component {
            Utf8Component::Normal(part) => normalized.push(part),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => bail!("layout path `{}` must not contain `..`", raw),
            Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                bail!("layout path `{}` must be relative", raw)
            }
        }
    }
    Ok(normalized)
}
