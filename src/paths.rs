use std::path::{Path, PathBuf};

/// Normalize a path string by trimming trailing spaces and trailing path
/// separators (repeatedly, in any interleaving). Leading and internal
/// content is left untouched; an empty input stays empty.
pub fn normalize(path: &str) -> String {
    path.trim_end_matches([' ', '\\', '/']).to_string()
}

/// Normalize a `Path`, preserving it as a `PathBuf`.
pub fn normalize_path(path: &Path) -> PathBuf {
    PathBuf::from(normalize(&path.to_string_lossy()))
}

/// Key used to compare two paths for identity. Destination filesystems are
/// treated as case-insensitive, so equality is over the lowercased
/// normalized form.
pub fn dedup_key(path: &Path) -> String {
    normalize(&path.to_string_lossy()).to_lowercase()
}

/// Whether two paths refer to the same target folder or file.
pub fn same_target(a: &Path, b: &Path) -> bool {
    dedup_key(a) == dedup_key(b)
}
