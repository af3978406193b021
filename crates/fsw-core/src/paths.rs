//! Path helpers for watch roots and native event paths.
//!
//! Watch roots are stored absolute, symlink-resolved, and with exactly one
//! trailing separator so that stripping the root from an event path leaves a
//! relative path with no leading separator. Comparisons against the root are
//! case-insensitive because the default macOS volume format is.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};

/// The separator used by native event paths.
pub const SEPARATOR: char = '/';

/// Makes `path` absolute and resolves every symlink along it.
///
/// # Errors
///
/// Returns the underlying I/O error (carrying the OS error code) if the path
/// does not exist, cannot be accessed, or does not resolve to UTF-8.
pub fn resolve_absolute_existing_path(path: &Utf8Path) -> io::Result<Utf8PathBuf> {
    path.canonicalize_utf8()
}

/// Returns `path` with exactly one trailing separator.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use fsw_core::paths::with_trailing_separator;
///
/// assert_eq!(with_trailing_separator(Utf8Path::new("/tmp/a")), "/tmp/a/");
/// assert_eq!(with_trailing_separator(Utf8Path::new("/tmp/a//")), "/tmp/a/");
/// assert_eq!(with_trailing_separator(Utf8Path::new("/")), "/");
/// ```
#[must_use]
pub fn with_trailing_separator(path: &Utf8Path) -> Utf8PathBuf {
    let trimmed = path.as_str().trim_end_matches(SEPARATOR);
    let mut root = String::with_capacity(trimmed.len() + 1);
    root.push_str(trimmed);
    root.push(SEPARATOR);
    Utf8PathBuf::from(root)
}

/// Resolves a directory into the canonical watch-root form.
///
/// # Errors
///
/// See [`resolve_absolute_existing_path`].
pub fn resolve_watch_root(path: &Utf8Path) -> io::Result<Utf8PathBuf> {
    let resolved = resolve_absolute_existing_path(path)?;
    Ok(with_trailing_separator(&resolved))
}

/// Returns the root without its trailing separator, keeping `/` intact.
#[must_use]
pub fn trim_root(root: &str) -> &str {
    match root.strip_suffix(SEPARATOR) {
        Some("") | None => root,
        Some(trimmed) => trimmed,
    }
}

/// Probes whether `path` exists as a file (`expect_file`) or a directory.
///
/// Symlinks are followed; a dangling link reports `false`.
#[must_use]
pub fn path_exists(path: &Utf8Path, expect_file: bool) -> bool {
    match std::fs::metadata(path) {
        Ok(metadata) if expect_file => metadata.is_file(),
        Ok(metadata) => metadata.is_dir(),
        Err(_) => false,
    }
}

/// Compares two strings case-insensitively.
///
/// ASCII is compared byte-wise; anything else falls back to full Unicode
/// lowercasing.
#[must_use]
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Strips `root` (with its trailing separator) from the front of `path`.
///
/// Returns `None` if `path` does not live under `root`. An empty result denotes
/// the root itself.
///
/// # Examples
///
/// ```
/// use fsw_core::paths::strip_root;
///
/// assert_eq!(strip_root("/Users/a/Docs/x.txt", "/users/a/docs/"), Some("x.txt"));
/// assert_eq!(strip_root("/Users/a/Docs/sub/y", "/Users/a/Docs/"), Some("sub/y"));
/// assert_eq!(strip_root("/elsewhere/x", "/Users/a/Docs/"), None);
/// ```
#[must_use]
pub fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let head = path.get(..root.len())?;
    if eq_ignore_case(head, root) {
        path.get(root.len()..)
    } else {
        None
    }
}
