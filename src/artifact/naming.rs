// Certvault — Filesystem-safe naming helpers

use std::path::{Path, PathBuf};

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
/// Leading dots are dropped so the result is never a hidden file.
pub fn underline(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = replaced.trim_start_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name without directories and without its last extension.
pub fn strip_path_and_extension(file: &str) -> String {
    let base = file.rsplit(['/', '\\']).next().unwrap_or(file);
    match base.rfind('.') {
        Some(0) | None => base.to_string(),
        Some(idx) => base[..idx].to_string(),
    }
}

/// First path in `dir` named `<stem><ext>`, `<stem>_1<ext>`, ... that does not exist yet.
pub fn dump_filename(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{}{}", stem, ext));
    let mut counter = 0;
    while candidate.exists() {
        counter += 1;
        candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
    }
    candidate
}

// ─── Tests ───────────────────────────────────────────────────────────────────
