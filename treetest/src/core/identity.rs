//! Stable, collision-resistant identities for test paths.
//!
//! An identity is a pure function of the full describe ancestry, the test
//! name and a salt. Re-running an unchanged tree therefore yields the same
//! identities, which is what keeps persisted snapshots attached to their
//! tests across runs.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::errors::EngineError;
use crate::core::path::TestPath;

/// Upper bound on salts tried before giving up on a test path.
pub const MAX_SALT_ATTEMPTS: u32 = 10_000;

const SLUG_MAX_CHARS: usize = 32;
const DIGEST_HEX_CHARS: usize = 16;

/// Identity of one test within a run, used as the snapshot key prefix.
pub type TestIdentity = String;

/// Compute the identity of `path` for a given salt.
///
/// Each segment is length-prefixed before hashing so that `["ab", "c"]` and
/// `["a", "bc"]` never collide.
pub fn digest(path: &TestPath, salt: u32) -> TestIdentity {
    let mut hasher = Sha256::new();
    for segment in path.describe.segments() {
        update_segment(&mut hasher, segment);
    }
    update_segment(&mut hasher, &path.name);
    hasher.update(salt.to_le_bytes());
    let hex = hex::encode(hasher.finalize());
    format!("{}-{}", slug(&path.name), &hex[..DIGEST_HEX_CHARS])
}

fn update_segment(hasher: &mut Sha256, segment: &str) {
    hasher.update((segment.len() as u64).to_le_bytes());
    hasher.update(segment.as_bytes());
}

/// Lowercased, filesystem-safe rendering of a test name.
fn slug(name: &str) -> String {
    let mut out = String::new();
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            let sep = pending_sep && !out.is_empty();
            if out.len() + usize::from(sep) + 1 > SLUG_MAX_CHARS {
                break;
            }
            if sep {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        out.push_str("test");
    }
    out
}

/// Assign the first unused identity for `path` and record it in `assigned`.
pub fn assign_identity(
    assigned: &mut HashSet<TestIdentity>,
    path: &TestPath,
) -> Result<TestIdentity, EngineError> {
    assign_identity_bounded(assigned, path, MAX_SALT_ATTEMPTS)
}

pub(crate) fn assign_identity_bounded(
    assigned: &mut HashSet<TestIdentity>,
    path: &TestPath,
    max_attempts: u32,
) -> Result<TestIdentity, EngineError> {
    for salt in 0..max_attempts {
        let identity = digest(path, salt);
        if assigned.insert(identity.clone()) {
            if salt > 0 {
                debug!(test = %path, salt, "identity collision resolved with salt");
            }
            return Ok(identity);
        }
    }
    warn!(test = %path, attempts = max_attempts, "identity salts exhausted");
    Err(EngineError::IdentityExhausted {
        test: path.to_string(),
        attempts: max_attempts,
    })
}
