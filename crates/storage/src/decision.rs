//! Skip/create/update decisions for archive members.
//!
//! Decisions are pure functions of the candidate and the remote state
//! observed through the existence cache.

use std::collections::HashMap;
use std::fmt;

use symstash_common::{METADATA_ORIGINAL_MD5_HASH, METADATA_ORIGINAL_SIZE};

use crate::types::{FileCandidate, RemoteObjectMetadata};

/// Why a decision was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    /// Nothing is stored under the key.
    NotFound,
    /// The stored size differs and no integrity metadata is available.
    SizeMismatch,
    /// Integrity metadata is present but does not match.
    HashMismatch,
    /// The stored object already holds these bytes.
    Unchanged,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label: &str = match self {
            DecisionReason::NotFound => "not-found",
            DecisionReason::SizeMismatch => "size-mismatch",
            DecisionReason::HashMismatch => "hash-mismatch",
            DecisionReason::Unchanged => "unchanged",
        };
        f.write_str(label)
    }
}

/// What to do with one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadDecision {
    /// Leave the stored object alone.
    Skip(DecisionReason),
    /// Write a new object.
    Create(DecisionReason),
    /// Overwrite the stored object.
    Update(DecisionReason),
}

impl UploadDecision {
    /// The reason attached to the decision.
    pub fn reason(&self) -> DecisionReason {
        match self {
            UploadDecision::Skip(reason)
            | UploadDecision::Create(reason)
            | UploadDecision::Update(reason) => *reason,
        }
    }

    /// Whether nothing needs to be written.
    pub fn is_skip(&self) -> bool {
        matches!(self, UploadDecision::Skip(_))
    }

    /// Whether an existing object gets replaced.
    pub fn is_update(&self) -> bool {
        matches!(self, UploadDecision::Update(_))
    }
}

impl fmt::Display for UploadDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadDecision::Skip(reason) => write!(f, "skip ({})", reason),
            UploadDecision::Create(reason) => write!(f, "create ({})", reason),
            UploadDecision::Update(reason) => write!(f, "update ({})", reason),
        }
    }
}

/// Decide whether `candidate` must be written.
///
/// Rules, in order:
/// 1. Nothing stored: create.
/// 2. Both `original_size` and `original_md5_hash` present: skip when both
///    match the candidate, update otherwise.
/// 3. No integrity metadata: compare the stored size with the size the
///    candidate would be stored at. For uncompressed keys that is the local
///    size; for compressed keys it is `stored_size`, the gzip payload size.
///
/// # Arguments
/// * `candidate` - The local file
/// * `remote` - Observed remote state
/// * `stored_size` - Size of the prepared payload, when already known
pub fn decide(
    candidate: &FileCandidate,
    remote: &RemoteObjectMetadata,
    stored_size: Option<u64>,
) -> UploadDecision {
    if !remote.exists() {
        return UploadDecision::Create(DecisionReason::NotFound);
    }

    if let Some((original_size, original_hash)) = integrity_metadata(remote) {
        let size_matches: bool = original_size.parse::<u64>().ok() == Some(candidate.local_size);
        let hash_matches: bool = original_hash == candidate.local_content_hash;
        return if size_matches && hash_matches {
            UploadDecision::Skip(DecisionReason::Unchanged)
        } else {
            UploadDecision::Update(DecisionReason::HashMismatch)
        };
    }

    let expected: Option<u64> = if candidate.compressed {
        stored_size
    } else {
        Some(candidate.local_size)
    };
    if expected == Some(remote.size) {
        UploadDecision::Skip(DecisionReason::Unchanged)
    } else {
        UploadDecision::Update(DecisionReason::SizeMismatch)
    }
}

/// Whether the compressed payload must be built before [`decide`] can
/// compare sizes.
pub fn needs_stored_size(candidate: &FileCandidate, remote: &RemoteObjectMetadata) -> bool {
    candidate.compressed && remote.exists() && integrity_metadata(remote).is_none()
}

fn integrity_metadata(remote: &RemoteObjectMetadata) -> Option<(&str, &str)> {
    let metadata: &HashMap<String, String> = remote.custom_metadata.as_ref()?;
    let size: &String = metadata.get(METADATA_ORIGINAL_SIZE)?;
    let hash: &String = metadata.get(METADATA_ORIGINAL_MD5_HASH)?;
    Some((size.as_str(), hash.as_str()))
}
