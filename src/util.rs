/// Shared path helpers.
pub mod fs {
    use std::io;
    use std::path::PathBuf;

    use anyhow::{Context, Result, anyhow};
    use camino::{Utf8Path, Utf8PathBuf};

    /// Convert an OS path into a UTF-8 path, failing with a readable message.
    pub fn utf8_path(path: PathBuf, what: &str) -> Result<Utf8PathBuf> {
        Utf8PathBuf::from_path_buf(path).map_err(|path| {
            anyhow!("{} is not valid UTF-8: {}", what, path.display())
        })
    }

    pub fn current_dir() -> Result<Utf8PathBuf> {
        let cwd = std::env::current_dir().context("determining current directory")?;
        utf8_path(cwd, "current directory")
    }

    /// What currently occupies a path. A path whose parent is a regular
    /// file counts as absent.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum Existing {
        Directory,
        Other,
        Absent,
    }

    pub fn inspect(path: &Utf8Path) -> Result<Existing> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(Existing::Directory),
            Ok(_) => Ok(Existing::Other),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(Existing::Absent)
            }
            Err(err) => Err(err).with_context(|| format!("inspecting {}", path)),
        }
    }
}
