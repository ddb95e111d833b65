//! Collision-free name resolution.
//!
//! Names derived from URLs are unbounded in length and repeat across
//! runs. [`resolve_unique`] guarantees a returned name never collides
//! with an existing entry while staying within a fixed length cap, by
//! truncating the base name and appending `-NNN` counters.

use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::Storage;

/// Width of the numeric counter.
const NUMBERING_WIDTH: usize = 3;
/// Separator plus counter, reserved in full before truncation.
const SUFFIX_LEN: usize = NUMBERING_WIDTH + 1;

/// Resolve `candidate` to a name that does not collide with any
/// existing storage entry.
///
/// A non-colliding candidate is returned unchanged. Otherwise the
/// candidate is split into base and extension (the last `.`-suffix,
/// accepted only when shorter than `max_ext_len`), the base is
/// truncated so `base-NNN[.ext]` fits `max_len`, and counters
/// `001..=999` are tried in order.
///
/// # Errors
///
/// [`Error::NameTooLong`] when the colliding candidate exceeds
/// `max_len` (or the caps leave no room for the suffix), and
/// [`Error::NamesExhausted`] when all 999 variants are taken;
/// callers must treat that as a hard failure.
pub fn resolve_unique<S: Storage>(
    storage: &S,
    candidate: &str,
    max_len: usize,
    max_ext_len: usize,
) -> Result<String> {
    if !storage.exists(candidate) {
        return Ok(candidate.to_string());
    }
    if candidate.len() > max_len {
        return Err(Error::NameTooLong);
    }

    // The extension keeps its leading dot; an over-long extension is
    // folded into the base instead.
    let ext = match candidate.rfind('.') {
        Some(pos) if candidate.len() - pos < max_ext_len => &candidate[pos..],
        _ => "",
    };

    let budget = max_len
        .checked_sub(SUFFIX_LEN + ext.len())
        .ok_or(Error::NameTooLong)?;
    let base_end = (candidate.len() - ext.len()).min(budget);
    let base = &candidate[..floor_char_boundary(candidate, base_end)];

    for counter in 1..1000 {
        let name = format!("{base}-{counter:0width$}{ext}", width = NUMBERING_WIDTH);
        if !storage.exists(&name) {
            debug!(candidate, resolved = %name, "resolved colliding name");
            return Ok(name);
        }
    }

    Err(Error::NamesExhausted)
}

/// Largest char-boundary index not exceeding `idx`.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
