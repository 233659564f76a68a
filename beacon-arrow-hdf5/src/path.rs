//! Helpers for `/`-separated paths inside an HDF5 file.

pub const SEPARATOR: char = '/';

/// Join `rel` onto `base` using POSIX rules: an absolute `rel` replaces `base`,
/// and a separator is only inserted when `base` does not already end with one.
pub fn join(base: &str, rel: &str) -> String {
    if rel.starts_with(SEPARATOR) || base.is_empty() {
        return rel.to_string();
    }
    if base.ends_with(SEPARATOR) {
        format!("{}{}", base, rel)
    } else {
        format!("{}{}{}", base, SEPARATOR, rel)
    }
}

/// Normalise a root path to an absolute path without trailing separators.
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_matches(SEPARATOR);
    format!("{}{}", SEPARATOR, trimmed)
}

/// Drops trailing separators, keeping `/` for the file root.
pub fn trim_trailing(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() && path.starts_with(SEPARATOR) {
        "/"
    } else {
        trimmed
    }
}

pub fn strip_leading(path: &str) -> &str {
    path.trim_start_matches(SEPARATOR)
}

pub fn is_file_root(path: &str) -> bool {
    path.trim_matches(SEPARATOR).is_empty()
}

/// Final segment of a path, e.g. `"c"` for `"/a/b/c"`.
pub fn last_segment(path: &str) -> &str {
    let path = path.trim_end_matches(SEPARATOR);
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}
