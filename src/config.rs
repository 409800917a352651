use std::fmt::Write as _;
use std::fs;

use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use toml_edit::{Array, DocumentMut, Item, Table, Value as EditValue, value};
use tracing::debug;

use crate::layout::{EntryKind, Layout, normalize_entry};
use crate::templates;

/// Directory holding a project-local or per-user layout file.
pub const LAYOUT_DIR: &str = ".scaffold";
pub const LAYOUT_FILE: &str = "layout.toml";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayoutSource {
    Explicit,
    Discovered,
    Home,
    Builtin,
}

impl LayoutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutSource::Explicit => "explicit",
            LayoutSource::Discovered => "discovered",
            LayoutSource::Home => "home",
            LayoutSource::Builtin => "builtin",
        }
    }
}

/// Where the active layout comes from. `path` is `None` only for the
/// builtin layout.
#[derive(Clone, Debug)]
pub struct LayoutLocation {
    pub path: Option<Utf8PathBuf>,
    pub source: LayoutSource,
}

#[derive(Clone, Debug)]
pub struct ResolvedLayout {
    pub layout: Layout,
    pub location: LayoutLocation,
}

/// Pick the layout file to use: an explicit path, then (only when
/// `discover` is set) the nearest `.scaffold/layout.toml` at or above
/// `start`, then the one under `home`. Otherwise the builtin layout.
pub fn locate(
    explicit: Option<&Utf8Path>,
    discover: bool,
    start: &Utf8Path,
    home: Option<&Utf8Path>,
) -> LayoutLocation {
    if let Some(path) = explicit {
        return LayoutLocation {
            path: Some(path.to_owned()),
            source: LayoutSource::Explicit,
        };
    }

    if !discover {
        return LayoutLocation {
            path: None,
            source: LayoutSource::Builtin,
        };
    }

    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(LAYOUT_DIR).join(LAYOUT_FILE);
        if candidate.is_file() {
            return LayoutLocation {
                path: Some(candidate),
                source: LayoutSource::Discovered,
            };
        }
        current = dir.parent();
    }

    if let Some(home) = home {
        let candidate = home.join(LAYOUT_DIR).join(LAYOUT_FILE);
        if candidate.is_file() {
            return LayoutLocation {
                path: Some(candidate),
                source: LayoutSource::Home,
            };
        }
    }

    LayoutLocation {
        path: None,
        source: LayoutSource::Builtin,
    }
}

pub fn resolve(
    explicit: Option<&Utf8Path>,
    discover: bool,
    start: &Utf8Path,
    home: Option<&Utf8Path>,
) -> Result<ResolvedLayout> {
    let location = locate(explicit, discover, start, home);
    let layout = match &location.path {
        Some(path) => load_from_path(path)?,
        None => Layout::builtin(),
    };
    debug!(
        source = location.source.as_str(),
        path = location.path.as_ref().map(|p| p.as_str()).unwrap_or("<builtin>"),
        "resolved layout"
    );
    Ok(ResolvedLayout { layout, location })
}

/// Load a layout file from disk, deserialize it and validate it.
pub fn load_from_path(path: &Utf8Path) -> Result<Layout> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading layout {}", path))?;
    Layout::from_toml_str(&raw).with_context(|| format!("loading layout {}", path))
}

pub fn write_layout(path: &Utf8Path, layout: &Layout, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!("{} already exists; rerun with --force to overwrite", path);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating directory {}", parent))?;
        }
    }

    let raw = layout.to_toml_string()?;
    fs::write(path, raw).with_context(|| format!("writing layout {}", path))
}

/// Validate that `entry` can be added to `layout`; returns its normalized path.
pub fn check_addition(
    layout: &Layout,
    entry: &str,
    kind: EntryKind,
    seed: Option<&str>,
) -> Result<Utf8PathBuf> {
    if kind == EntryKind::Directory && seed.is_some() {
        bail!("only files can carry a seed template");
    }
    let normalized = normalize_entry(entry)?;

    let mut extended = layout.clone();
    match kind {
        EntryKind::Directory => extended.directories.push(normalized.to_string()),
        EntryKind::File => extended.files.push(normalized.to_string()),
    }
    if let Some(seed) = seed {
        extended.seeds.insert(normalized.to_string(), seed.to_owned());
    }
    extended
        .validate()
        .with_context(|| format!("adding `{}` to the layout", normalized))?;
    Ok(normalized)
}

/// Append one entry to a layout file in place, keeping its formatting.
pub fn add_entry(path: &Utf8Path, entry: &str, kind: EntryKind, seed: Option<&str>) -> Result<()> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading layout {}", path))?;
    let current = Layout::from_toml_str(&raw).with_context(|| format!("loading layout {}", path))?;
    let normalized =
        check_addition(&current, entry, kind, seed).with_context(|| format!("updating {}", path))?;

    let mut doc: DocumentMut = raw
        .parse()
        .with_context(|| format!("parsing layout {}", path))?;

    let key = match kind {
        EntryKind::Directory => "directories",
        EntryKind::File => "files",
    };
    if !doc.as_table().contains_key(key) {
        doc[key] = value(Array::new());
    }
    let entries = doc
        .get_mut(key)
        .and_then(Item::as_value_mut)
        .and_then(EditValue::as_array_mut)
        .ok_or_else(|| anyhow!("layout has non-array `{}` entry", key))?;
    entries.push(normalized.as_str());

    if let Some(seed) = seed {
        if !doc.as_table().contains_key("seeds") {
            doc["seeds"] = Item::Table(Table::new());
        }
        let seeds = doc
            .get_mut("seeds")
            .and_then(Item::as_table_mut)
            .ok_or_else(|| anyhow!("layout has non-table `seeds` entry"))?;
        seeds.insert(normalized.as_str(), value(seed));
    }

    fs::write(path, doc.to_string()).with_context(|| format!("writing layout {}", path))
}

pub fn format_summary(resolved: &ResolvedLayout) -> String {
    let mut out = String::new();
    let layout = &resolved.layout;
    let path = resolved
        .location
        .path
        .as_ref()
        .map(|p| p.as_str())
        .unwrap_or("<builtin>");

    let _ = writeln!(out, "Layout: {} ({})", path, resolved.location.source.as_str());
    let _ = writeln!(out, "Root: {}", layout.root);
    let _ = writeln!(out, "Directories declared: {}", layout.directories.len());
    let _ = writeln!(out, "Files declared: {}", layout.files.len());
    if layout.seeds.is_empty() {
        let _ = writeln!(out, "Seeds: none");
    } else {
        let _ = writeln!(out, "Seeds:");
        for (file, template) in &layout.seeds {
            let _ = writeln!(out, "  - {} <- {}", file, template);
        }
    }
    let _ = write!(out, "Available seed templates: {}", templates::names().join(", "));
    out
}
