use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;

use crate::cli::{Cli, Command, InitArgs, LayoutAddArgs, LayoutCommand, OutputFormat};
use crate::config::{self, LAYOUT_DIR, LAYOUT_FILE, ResolvedLayout};
use crate::layout::{EntryKind, Plan};
use crate::scaffold::{self, Options};
use crate::util::fs::{current_dir, utf8_path};

pub fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext::from(&cli);
    ctx.apply_chdir()?;

    let command = cli
        .command
        .unwrap_or_else(|| Command::Init(InitArgs::default()));

    let base = current_dir()?;
    let home = dirs::home_dir().and_then(|home| Utf8PathBuf::from_path_buf(home).ok());
    let discover = wants_discovery(&ctx, &command);
    let state = AppState::new(ctx, base, home, discover)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    dispatch(&state, command, &mut out)
}

/// Scaffolding commands use the builtin layout unless `--file` or
/// `--discover` says otherwise; layout commands always look for a file.
fn wants_discovery(ctx: &CliContext, command: &Command) -> bool {
    ctx.discover || matches!(command, Command::Layout { .. })
}

fn dispatch(state: &AppState, command: Command, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Init(args) => handle_init(state, args, out),
        Command::Plan => handle_plan(state, out),
        Command::Check => handle_check(state, out),
        Command::Layout { command } => handle_layout(state, command, out),
    }
}

fn handle_init(state: &AppState, args: InitArgs, out: &mut dyn Write) -> Result<()> {
    let plan = state.plan()?;
    let opts = Options {
        dry_run: state.ctx.dry_run,
        keep_going: args.keep_going,
        seed: args.seed,
    };
    let report = scaffold::apply(&plan, &opts)?;

    // Failures only reach this point in keep-going mode, where every entry
    // has been attempted; the completion line is still printed once.
    match state.ctx.format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?,
        OutputFormat::Text => writeln!(out, "{}", report.completion_line())?,
    }

    if report.has_failures() {
        bail!("{}", report.failure_summary());
    }
    Ok(())
}

fn handle_plan(state: &AppState, out: &mut dyn Write) -> Result<()> {
    let plan = state.plan()?;
    if state.ctx.format == OutputFormat::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(&plan)?)?;
        return Ok(());
    }

    for entry in plan.tree_order() {
        let depth = entry.relative.components().count().saturating_sub(1);
        let name = entry.relative.file_name().unwrap_or(entry.relative.as_str());
        let suffix = match entry.kind {
            EntryKind::Directory => "/",
            EntryKind::File => "",
        };
        match &entry.seed {
            Some(template) => writeln!(
                out,
                "{}{}{}  (seed: {})",
                "  ".repeat(depth),
                name,
                suffix,
                template
            )?,
            None => writeln!(out, "{}{}{}", "  ".repeat(depth), name, suffix)?,
        }
    }
    writeln!(
        out,
        "{} directories, {} files",
        plan.directories().count(),
        plan.files().count()
    )?;
    Ok(())
}

fn handle_check(state: &AppState, out: &mut dyn Write) -> Result<()> {
    let plan = state.plan()?;
    let report = scaffold::check(&plan)?;

    match state.ctx.format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?,
        OutputFormat::Text => writeln!(out, "{}", report.render_text())?,
    }

    if !report.is_complete() {
        bail!("{}", report.failure_summary());
    }
    Ok(())
}

fn handle_layout(state: &AppState, command: LayoutCommand, out: &mut dyn Write) -> Result<()> {
    match command {
        LayoutCommand::Show => layout_show(state, out),
        LayoutCommand::Export { path, force } => layout_export(state, path, force, out),
        LayoutCommand::Add(args) => layout_add(state, args, out),
    }
}

fn layout_show(state: &AppState, out: &mut dyn Write) -> Result<()> {
    let resolved = &state.resolved;
    match state.ctx.format {
        OutputFormat::Json => {
            let document = json!({
                "source": resolved.location.source.as_str(),
                "path": resolved.location.path,
                "layout": resolved.layout,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&document)?)?;
        }
        OutputFormat::Text => writeln!(out, "{}", config::format_summary(resolved))?,
    }
    Ok(())
}

fn layout_export(
    state: &AppState,
    path: Option<PathBuf>,
    force: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let Some(path) = path else {
        write!(out, "{}", state.resolved.layout.to_toml_string()?)?;
        return Ok(());
    };

    let target = state.base.join(utf8_path(path, "export path")?);
    if state.ctx.dry_run {
        writeln!(out, "Dry run: would write layout to {}", target)?;
        return Ok(());
    }
    config::write_layout(&target, &state.resolved.layout, force)?;
    writeln!(out, "Wrote layout to {}", target)?;
    Ok(())
}

fn layout_add(state: &AppState, args: LayoutAddArgs, out: &mut dyn Write) -> Result<()> {
    let kind = if args.dir {
        EntryKind::Directory
    } else {
        EntryKind::File
    };

    // Fail before touching the disk if the entry cannot be added.
    let normalized =
        config::check_addition(&state.resolved.layout, &args.path, kind, args.seed.as_deref())?;

    let existing = state.resolved.location.path.clone();
    let target = existing
        .clone()
        .unwrap_or_else(|| state.base.join(LAYOUT_DIR).join(LAYOUT_FILE));

    if state.ctx.dry_run {
        writeln!(
            out,
            "Dry run: would add {} `{}` to {}",
            kind.as_str(),
            normalized,
            target
        )?;
        return Ok(());
    }

    if existing.is_none() {
        config::write_layout(&target, &state.resolved.layout, false)?;
        writeln!(out, "Created {} from the builtin layout", target)?;
    }
    config::add_entry(&target, normalized.as_str(), kind, args.seed.as_deref())?;
    writeln!(out, "Added {} `{}` to {}", kind.as_str(), normalized, target)?;
    Ok(())
}

#[derive(Clone, Debug)]
struct CliContext {
    chdir: Option<PathBuf>,
    file: Option<PathBuf>,
    root: Option<String>,
    discover: bool,
    dry_run: bool,
    format: OutputFormat,
}

impl CliContext {
    fn apply_chdir(&self) -> Result<()> {
        if let Some(path) = &self.chdir {
            std::env::set_current_dir(path)
                .with_context(|| format!("changing directory to {}", path.display()))?;
        }
        Ok(())
    }

    fn explicit_layout(&self, base: &Utf8Path) -> Result<Option<Utf8PathBuf>> {
        self.file
            .clone()
            .map(|file| utf8_path(file, "layout path").map(|file| base.join(file)))
            .transpose()
    }
}

impl From<&Cli> for CliContext {
    fn from(cli: &Cli) -> Self {
        Self {
            chdir: cli.chdir.clone(),
            file: cli.file.clone(),
            root: cli.root.clone(),
            discover: cli.discover,
            dry_run: cli.dry_run,
            format: cli.format,
        }
    }
}

struct AppState {
    ctx: CliContext,
    base: Utf8PathBuf,
    resolved: ResolvedLayout,
}

impl AppState {
    fn new(
        ctx: CliContext,
        base: Utf8PathBuf,
        home: Option<Utf8PathBuf>,
        discover: bool,
    ) -> Result<Self> {
        let explicit = ctx.explicit_layout(&base)?;
        let mut resolved =
            config::resolve(explicit.as_deref(), discover, &base, home.as_deref())?;
        if let Some(root) = &ctx.root {
            resolved.layout = resolved.layout.with_root(root);
            resolved
                .layout
                .validate()
                .with_context(|| format!("applying --root {}", root))?;
        }
        Ok(Self {
            ctx,
            base,
            resolved,
        })
    }

    fn plan(&self) -> Result<Plan> {
        self.resolved.layout.plan(&self.base)
    }
}
