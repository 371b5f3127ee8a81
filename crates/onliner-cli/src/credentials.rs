//! Token file: one credential per line.

use std::path::Path;

use anyhow::{bail, Context, Result};

use onliner_core::Credential;

/// Parse token file contents. Lines are trimmed; blank lines and `#`
/// comments are skipped; order is kept.
pub fn parse(content: &str) -> Vec<Credential> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Credential::from)
        .collect()
}

/// Read every credential in `path`. An empty file is an error.
pub fn load(path: &Path) -> Result<Vec<Credential>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tokens from {}", path.display()))?;
    let credentials = parse(&content);
    if credentials.is_empty() {
        bail!("no tokens found in {}", path.display());
    }
    tracing::debug!(path = %path.display(), count = credentials.len(), "loaded tokens");
    Ok(credentials)
}
