//! Listing and validation of extracted symbol archives.
//!
//! Archive decompression happens elsewhere; this module starts from a
//! directory holding the extracted members.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use symstash_common::{is_hex, md5_file, relative_posix_name, split_symbol_name, SymbolPath};
use walkdir::WalkDir;

use crate::error::ArchiveError;
use crate::types::{BucketLocation, FileCandidate, UploadSettings};

/// Archive file suffixes accepted for upload (lowercase).
pub const ACCEPTED_ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".tar", ".tar.gz", ".tgz"];

/// One extracted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// POSIX-style name relative to the archive root.
    pub name: String,
    /// Location of the extracted bytes.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// The files of one extracted archive, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveListing {
    members: Vec<ArchiveMember>,
}

impl ArchiveListing {
    /// Build a listing from explicit members.
    pub fn from_members(mut members: Vec<ArchiveMember>) -> Self {
        members.sort_by(|a: &ArchiveMember, b: &ArchiveMember| a.name.cmp(&b.name));
        Self { members }
    }

    /// Walk an extraction directory and list every regular file in it.
    ///
    /// # Errors
    /// Returns `ArchiveError::Io` if the directory cannot be walked.
    pub fn from_directory(root: &Path) -> Result<Self, ArchiveError> {
        let mut members: Vec<ArchiveMember> = Vec::new();

        for entry in WalkDir::new(root).follow_links(false).into_iter() {
            let entry: walkdir::DirEntry = entry.map_err(|e| ArchiveError::Io {
                path: e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                message: e.to_string(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path: &Path = entry.path();
            let name: String = relative_posix_name(path, root).map_err(|e| ArchiveError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let size: u64 = entry
                .metadata()
                .map_err(|e| ArchiveError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?
                .len();

            members.push(ArchiveMember {
                name,
                path: path.to_path_buf(),
                size,
            });
        }

        Ok(Self::from_members(members))
    }

    /// The members, sorted by name.
    pub fn members(&self) -> &[ArchiveMember] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the archive holds no files.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Check that an uploaded archive's file name has a supported suffix.
///
/// # Errors
/// Returns `ArchiveError::UnrecognizedExtension` naming the last suffix.
pub fn validate_archive_filename(filename: &str) -> Result<(), ArchiveError> {
    let lower: String = filename.to_ascii_lowercase();
    if ACCEPTED_ARCHIVE_SUFFIXES
        .iter()
        .any(|suffix: &&str| lower.ends_with(suffix))
    {
        return Ok(());
    }

    let extension: String = Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    Err(ArchiveError::UnrecognizedExtension { extension })
}

/// Validate every member name of a listing.
///
/// Checks run per file in this order: allowed characters, disallowed
/// snippets, name pattern. The first failure is returned.
///
/// # Errors
/// Returns `ArchiveError::Empty` for an empty listing, or the first
/// per-file violation.
pub fn validate_listing(listing: &ArchiveListing, settings: &UploadSettings) -> Result<(), ArchiveError> {
    if listing.is_empty() {
        return Err(ArchiveError::Empty);
    }

    for member in listing.members() {
        let name: &str = member.name.as_str();

        if !allowed_characters().is_match(name) {
            return Err(ArchiveError::InvalidCharacter {
                name: name.to_string(),
            });
        }

        if let Some(snippet) = settings
            .disallowed_snippets
            .iter()
            .find(|snippet: &&String| !snippet.is_empty() && name.contains(snippet.as_str()))
        {
            return Err(ArchiveError::DisallowedSnippet {
                snippet: snippet.clone(),
            });
        }

        if !is_recognized_pattern(name, settings) {
            return Err(ArchiveError::UnrecognizedPattern {
                name: name.to_string(),
            });
        }
    }

    Ok(())
}

/// Turn a validated listing into upload candidates.
///
/// Reads every file to compute its md5, so callers on an async runtime
/// should run this on a blocking thread. Ignored files are included; the
/// orchestrator filters them.
///
/// # Errors
/// Returns `ArchiveError::Io` if a member cannot be read.
pub fn build_candidates(
    listing: &ArchiveListing,
    location: &BucketLocation,
    settings: &UploadSettings,
) -> Result<Vec<FileCandidate>, ArchiveError> {
    listing
        .members()
        .iter()
        .map(|member: &ArchiveMember| {
            let local_content_hash: String =
                md5_file(&member.path).map_err(|e| ArchiveError::Io {
                    path: member.path.display().to_string(),
                    message: e.to_string(),
                })?;
            Ok(FileCandidate {
                name: member.name.clone(),
                storage_key: location.symbol_key(&member.name),
                local_path: member.path.clone(),
                local_size: member.size,
                local_content_hash,
                compressed: settings.should_compress(&member.name),
            })
        })
        .collect()
}

fn is_recognized_pattern(name: &str, settings: &UploadSettings) -> bool {
    if settings.is_ignored(name) {
        return true;
    }
    matches!(
        split_symbol_name(name),
        Some(SymbolPath { debug_id, .. }) if is_hex(debug_id)
    )
}

fn allowed_characters() -> &'static Regex {
    static ALLOWED: OnceLock<Regex> = OnceLock::new();
    ALLOWED.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.@+/-]+$").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use symstash_common::md5_bytes;
    use tempfile::TempDir;

    fn member(name: &str) -> ArchiveMember {
        ArchiveMember {
            name: name.to_string(),
            path: PathBuf::from("/tmp").join(name),
            size: 1,
        }
    }

    fn listing(names: &[&str]) -> ArchiveListing {
        ArchiveListing::from_members(names.iter().map(|n| member(n)).collect())
    }

    #[test]
    fn test_validate_archive_filename() {
        assert!(validate_archive_filename("symbols.zip").is_ok());
        assert!(validate_archive_filename("symbols.ZIP").is_ok());
        assert!(validate_archive_filename("symbols.tar").is_ok());
        assert!(validate_archive_filename("symbols.tar.gz").is_ok());
        assert!(validate_archive_filename("symbols.tgz").is_ok());

        let err = validate_archive_filename("myfile.rar").unwrap_err();
        assert_eq!(err.to_string(), "Unrecognized archive file extension \".rar\"");
    }

    #[test]
    fn test_valid_listing() {
        let listing = listing(&[
            "build-symbols.txt",
            "xpcshell.dbg/A7D6F1BB18CD4CB48/xpcshell.sym",
            "south-africa-flag/deadbeef/south-africa-flag.jpeg",
        ]);
        assert!(validate_listing(&listing, &UploadSettings::default()).is_ok());
    }

    #[test]
    fn test_empty_listing() {
        let err = validate_listing(&ArchiveListing::default(), &UploadSettings::default()).unwrap_err();
        assert_eq!(err, ArchiveError::Empty);
    }

    #[test]
    fn test_invalid_character() {
        let listing = listing(&["xpcfoo.dbg/A7D6F1BB18CD4CB48/p%eter.sym"]);
        let err = validate_listing(&listing, &UploadSettings::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid character in filename 'xpcfoo.dbg/A7D6F1BB18CD4CB48/p%eter.sym'"
        );
    }

    #[test]
    fn test_disallowed_snippet() {
        let settings = UploadSettings::default().with_disallowed_snippets(["xpcshell.sym"]);
        let listing = listing(&["xpcshell.dbg/A7D6F1BB18CD4CB48/xpcshell.sym"]);
        let err = validate_listing(&listing, &settings).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Content of archive file contains the snippet 'xpcshell.sym' which is not allowed"
        );
    }

    #[test]
    fn test_unrecognized_pattern() {
        for name in [
            "foo/bar.sym",
            "xpcshell.dbg/NOTHEX/xpcshell.sym",
            "a/B1/c/d.sym",
            "nested/build-symbols.txt",
            "README",
        ] {
            let err = validate_listing(&listing(&[name]), &UploadSettings::default()).unwrap_err();
            assert!(
                matches!(err, ArchiveError::UnrecognizedPattern { .. }),
                "{} gave {:?}",
                name,
                err
            );
        }
    }

    #[test]
    fn test_checks_run_in_order() {
        // Bad characters win over an unrecognized pattern.
        let err = validate_listing(&listing(&["p%eter"]), &UploadSettings::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidCharacter { .. }));
    }

    #[test]
    fn test_from_directory_and_build_candidates() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("xpcshell.dbg/A7D6F1BB18CD4CB48")).unwrap();
        std::fs::write(
            root.join("xpcshell.dbg/A7D6F1BB18CD4CB48/xpcshell.sym"),
            b"MODULE Linux x86_64 A7D6F1BB18CD4CB48 xpcshell.dbg\n",
        )
        .unwrap();
        std::fs::write(root.join("build-symbols.txt"), b"listing\n").unwrap();

        let listing = ArchiveListing::from_directory(root).unwrap();
        let names: Vec<&str> = listing.members().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["build-symbols.txt", "xpcshell.dbg/A7D6F1BB18CD4CB48/xpcshell.sym"]
        );

        let settings = UploadSettings::default();
        validate_listing(&listing, &settings).unwrap();

        let location = BucketLocation::new("private", "prefix");
        let candidates = build_candidates(&listing, &location, &settings).unwrap();
        assert_eq!(candidates.len(), 2);

        let sym = &candidates[1];
        assert_eq!(
            sym.storage_key,
            "prefix/v0/xpcshell.dbg/A7D6F1BB18CD4CB48/xpcshell.sym"
        );
        assert!(sym.compressed);
        assert_eq!(
            sym.local_content_hash,
            md5_bytes(b"MODULE Linux x86_64 A7D6F1BB18CD4CB48 xpcshell.dbg\n")
        );
        assert_eq!(sym.local_size, 51);
        assert!(!candidates[0].compressed);
    }
}
