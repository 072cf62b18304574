//! Collision-safe renaming.
//!
//! The executor builds `<stem>.pdf`, `<stem>_2.pdf`, `<stem>_3.pdf`, … next
//! to the original file and applies the first candidate that does not already
//! exist. The existence probe and the rename are not one atomic step; a race
//! against a concurrent writer is accepted.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::RenameResult;

/// Extension applied to every rename target.
const PDF_EXTENSION: &str = "pdf";

/// Renames `original` to `<stem>.pdf` in the same directory, avoiding
/// collisions with an increasing `_N` suffix.
///
/// Never panics and never returns an error: every filesystem failure is
/// captured in the returned [`RenameResult`].
#[must_use]
pub fn rename_with_suffix(original: &Path, stem: &str) -> RenameResult {
    let target = next_free_candidate(original, stem);

    debug!(
        from = %original.display(),
        to = %target.display(),
        "renaming file"
    );

    match fs::rename(original, &target) {
        Ok(()) => RenameResult::success(original, target, stem),
        Err(e) => RenameResult::failure(original, stem, e.to_string()),
    }
}

/// Picks the first candidate path that does not exist yet.
///
/// The first candidate carries no suffix; later ones append `_2`, `_3`, ….
fn next_free_candidate(original: &Path, stem: &str) -> PathBuf {
    let mut counter: u32 = 1;
    loop {
        let file_name = if counter == 1 {
            format!("{stem}.{PDF_EXTENSION}")
        } else {
            format!("{stem}_{counter}.{PDF_EXTENSION}")
        };
        let candidate = original.with_file_name(file_name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
