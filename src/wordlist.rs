use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::FuzzError;

/// Turn wordlist content into an ordered, deduplicated list of candidates.
///
/// Per line:
/// - blank lines are skipped
/// - lines starting with `#` (after leading whitespace) are comments
/// - everything else is trimmed and lowercased
///
/// When `extensions` is non-empty every keyword is followed by one variant per
/// extension (`login`, `login.php`, `login.html`) and the combined list is
/// deduplicated ignoring case. First occurrence wins.
pub fn parse_wordlist_str(s: &str, extensions: &[String]) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut seen = HashSet::new();

    for raw_line in s.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let keyword = line.to_lowercase();
        if seen.insert(keyword.clone()) {
            keywords.push(keyword);
        }
    }

    let exts = normalize_extensions(extensions);
    if exts.is_empty() {
        return keywords;
    }

    let mut out = Vec::with_capacity(keywords.len() * (exts.len() + 1));
    let mut seen = HashSet::new();
    for kw in &keywords {
        let variants = std::iter::once(kw.clone()).chain(exts.iter().map(|ext| format!("{kw}{ext}")));
        for v in variants {
            if seen.insert(v.to_lowercase()) {
                out.push(v);
            }
        }
    }
    out
}

/// `php` -> `.php`; `.html` is left alone. Empty entries are dropped.
pub fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty() && *e != ".")
        .map(|e| {
            if e.starts_with('.') {
                e.to_string()
            } else {
                format!(".{e}")
            }
        })
        .collect()
}

/// Read a wordlist from disk and expand it into candidates.
///
/// A path that does not exist is reported as [`FuzzError::MissingWordlist`] so
/// the caller can stop before touching the network.
pub fn load_candidates(path: impl AsRef<Path>, extensions: &[String]) -> Result<Vec<String>, FuzzError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(FuzzError::MissingWordlist(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| FuzzError::UnreadableWordlist {
        path: path.to_path_buf(),
        source,
    })?;
    // Editors on Windows like to prepend a byte-order mark.
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    Ok(parse_wordlist_str(content, extensions))
}
