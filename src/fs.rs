//! Filesystem helpers for the page mark store.

use eyre::{Result, WrapErr};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Characters Windows refuses in file names (Linux is laxer).
static ILLEGAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\?<>\\:\*\|"]"#).expect("invalid chars regexp"));

/// Trailing dots/spaces are not portable either.
static ILLEGAL_TRAILING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[. ]+$").expect("invalid trailing regex"));

/// Turns a serie ID into a safe document file name.
pub fn document_name(serie_id: &str) -> PathBuf {
    let name = ILLEGAL_TRAILING.replace(serie_id, "");
    let mut filename: PathBuf =
        ILLEGAL_CHARS.replace_all(&name, "_").into_owned().into();
    filename.set_extension("json");
    filename
}

/// Recursively create a directory and all of its parent if necessary.
pub fn mkdir_p(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("mkdir_p {}", path.display()))
}

/// Write a file atomically (using a tempfile + atomic rename).
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp_path = path.to_path_buf();
    tmp_path.set_extension("part");

    fs::write(&tmp_path, data)
        .with_context(|| format!("write {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path)
        .with_context(|| format!("rename to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_name_is_sanitized() {
        assert_eq!(document_name("12345"), PathBuf::from("12345.json"));
        assert_eq!(document_name("a/b:c"), PathBuf::from("a_b_c.json"));
        assert_eq!(document_name("dots.. "), PathBuf::from("dots.json"));
    }
}
