use anyhow::{Result, anyhow};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "templates"]
struct Templates;

pub fn exists(path: &str) -> bool {
    Templates::get(path).is_some()
}

pub fn get_bytes(path: &str) -> Result<Vec<u8>> {
    let file = Templates::get(path).ok_or_else(|| anyhow!("embedded template `{}` missing", path))?;
    Ok(file.data.as_ref().to_vec())
}

#[cfg(test)]
pub fn get_string(path: &str) -> Result<String> {
    use anyhow::Context;

    let bytes = get_bytes(path)?;
    String::from_utf8(bytes).with_context(|| format!("decoding embedded template `{}`", path))
}

/// Names of every embedded template, sorted.
pub fn names() -> Vec<String> {
    let mut names: Vec<String> = Templates::iter().map(|name| name.into_owned()).collect();
    names.sort();
    names
}
