use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI definition. Running without a subcommand behaves like `init`.
#[derive(Parser, Debug)]
#[command(
    name = "readme-scaffold",
    version,
    about = "Create the readme_generator project skeleton"
)]
pub struct Cli {
    #[arg(short = 'C', long = "chdir", global = true)]
    pub chdir: Option<PathBuf>,
    /// Layout file to use instead of the discovered or builtin one
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,
    /// Look for `.scaffold/layout.toml` in parent and home directories
    /// (always on for `layout` commands)
    #[arg(long = "discover", global = true)]
    pub discover: bool,
    /// Override the layout's root directory (`.` scaffolds in place)
    #[arg(long = "root", global = true)]
    pub root: Option<String>,
    #[arg(short = 'n', long = "dry-run", global = true)]
    pub dry_run: bool,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create every missing directory and file of the layout (default).
    Init(InitArgs),
    /// Print the resolved layout as a tree without touching the filesystem.
    Plan,
    /// Report layout entries that are missing or occupied by the wrong kind.
    Check,
    /// Inspect, export, or extend the layout definition.
    Layout {
        #[command(subcommand)]
        command: LayoutCommand,
    },
}

#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Continue past failures and report them at the end
    #[arg(long = "keep-going")]
    pub keep_going: bool,
    /// Fill newly created project files with starter contents
    #[arg(long = "seed")]
    pub seed: bool,
}

#[derive(Subcommand, Debug)]
pub enum LayoutCommand {
    /// Show where the active layout comes from and what it declares.
    Show,
    /// Write the active layout as TOML (stdout when no path is given).
    Export {
        #[arg()]
        path: Option<PathBuf>,
        #[arg(long = "force", default_value_t = false)]
        force: bool,
    },
    /// Append a file or directory to the layout file.
    Add(LayoutAddArgs),
}

#[derive(Args, Debug)]
pub struct LayoutAddArgs {
    /// Path relative to the layout root
    pub path: String,
    /// Add a directory instead of a file
    #[arg(long = "dir")]
    pub dir: bool,
    /// Embedded template used by `init --seed`
    #[arg(long = "seed", conflicts_with = "dir")]
    pub seed: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Helper entry point so `main` can stay minimal.
pub fn parse() -> Cli {
    Cli::parse()
}
