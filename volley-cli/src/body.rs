use anyhow::{bail, Context};
use std::path::Path;

/// Resolves the request body. A body file always wins over the inline string.
pub fn load(file: Option<&Path>, inline: &str) -> anyhow::Result<Vec<u8>> {
    let Some(path) = file else {
        return Ok(inline.as_bytes().to_vec());
    };

    if !path.exists() {
        bail!("body file not found: {}", path.display());
    }
    std::fs::read(path).with_context(|| format!("failed to read body file {}", path.display()))
}
