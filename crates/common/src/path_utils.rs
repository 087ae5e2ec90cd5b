//! Path helpers for extracted archives and symbol names.
//!
//! Symbol names inside an archive are POSIX-style relative paths of the
//! form `<module>/<debug_id>/<file>`, e.g. `xpcshell.dbg/A7D6F1BB18CD4CB48/xpcshell.sym`.

use std::path::{Component, Path};

use crate::error::PathError;

/// A symbol name split into its three segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolPath<'a> {
    /// Debug file name of the module, e.g. `xpcshell.dbg`.
    pub module: &'a str,
    /// Debug identifier, a hex string.
    pub debug_id: &'a str,
    /// Symbol file name, e.g. `xpcshell.sym`.
    pub file: &'a str,
}

/// Convert a path to POSIX-style string (forward slashes).
///
/// # Arguments
/// * `path` - Path to convert
///
/// # Returns
/// String with forward slashes as separators.
pub fn to_posix_path(path: &Path) -> String {
    path.components()
        .map(|c: Component| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Express `path` relative to `root` as a POSIX-style name.
///
/// # Errors
/// Returns error if path is not under root.
pub fn relative_posix_name(path: &Path, root: &Path) -> Result<String, PathError> {
    let relative: &Path = path
        .strip_prefix(root)
        .map_err(|_| PathError::PathOutsideRoot {
            path: path.display().to_string(),
            root: root.display().to_string(),
        })?;

    let name: String = to_posix_path(relative);
    if name.is_empty() {
        return Err(PathError::InvalidPath {
            path: path.display().to_string(),
        });
    }
    Ok(name)
}

/// Split `<module>/<debug_id>/<file>` into its segments.
///
/// Returns None unless there are exactly three non-empty segments.
pub fn split_symbol_name(name: &str) -> Option<SymbolPath<'_>> {
    let mut parts = name.split('/');
    let module: &str = parts.next()?;
    let debug_id: &str = parts.next()?;
    let file: &str = parts.next()?;
    if parts.next().is_some() || module.is_empty() || debug_id.is_empty() || file.is_empty() {
        return None;
    }
    Some(SymbolPath {
        module,
        debug_id,
        file,
    })
}

/// Whether the string is non-empty and made only of hex digits.
pub fn is_hex(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c: char| c.is_ascii_hexdigit())
}

/// Lowercased extension of the last path segment, without the dot.
pub fn extension_lowercase(name: &str) -> Option<String> {
    let file_name: &str = name.rsplit('/').next().unwrap_or(name);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_to_posix_path() {
        let path: PathBuf = PathBuf::from("a/b/c");
        assert_eq!(to_posix_path(&path), "a/b/c");
    }

    #[test]
    fn test_relative_posix_name() {
        let name: String = relative_posix_name(
            Path::new("/tmp/extract/xpcshell.dbg/A7D6/xpcshell.sym"),
            Path::new("/tmp/extract"),
        )
        .unwrap();
        assert_eq!(name, "xpcshell.dbg/A7D6/xpcshell.sym");
    }

    #[test]
    fn test_relative_posix_name_outside_root() {
        let result = relative_posix_name(Path::new("/etc/passwd"), Path::new("/tmp/extract"));
        assert!(matches!(result, Err(PathError::PathOutsideRoot { .. })));
    }

    #[test]
    fn test_relative_posix_name_root_itself() {
        let result = relative_posix_name(Path::new("/tmp/extract"), Path::new("/tmp/extract"));
        assert!(matches!(result, Err(PathError::InvalidPath { .. })));
    }

    #[test]
    fn test_split_symbol_name() {
        let parts: SymbolPath = split_symbol_name("south-africa-flag/deadbeef/flag.jpeg").unwrap();
        assert_eq!(parts.module, "south-africa-flag");
        assert_eq!(parts.debug_id, "deadbeef");
        assert_eq!(parts.file, "flag.jpeg");
    }

    #[test]
    fn test_split_symbol_name_rejects_other_shapes() {
        assert!(split_symbol_name("build-symbols.txt").is_none());
        assert!(split_symbol_name("a/b").is_none());
        assert!(split_symbol_name("a/b/c/d").is_none());
        assert!(split_symbol_name("a//c").is_none());
    }

    #[test]
    fn test_is_hex() {
        assert!(is_hex("A7D6F1BB18CD4CB48"));
        assert!(is_hex("deadbeef"));
        assert!(!is_hex("xyz"));
        assert!(!is_hex(""));
    }

    #[test]
    fn test_extension_lowercase() {
        assert_eq!(extension_lowercase("foo.BAR"), Some("bar".to_string()));
        assert_eq!(extension_lowercase("a.dbg/ID/xpcshell.sym"), Some("sym".to_string()));
        assert_eq!(extension_lowercase("a.dbg/ID/noext"), None);
        assert_eq!(extension_lowercase(".hidden"), None);
    }
}
