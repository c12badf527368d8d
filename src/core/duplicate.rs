// Exact-content duplicate resolution.
//
// Assets are fed in directory-listing order. The first asset seen for a
// fingerprint is kept unless a later one has an original-looking name while
// the kept one looks like a copy.

use crate::core::hash::Fingerprint;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

static PAREN_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\d+\)").unwrap());
static TRAILING_DASH_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\d+$").unwrap());

/// Does this filename look like an OS- or user-made copy?
///
/// Matched against the whole name, extension included, so "beach-1.jpg" is
/// not a copy but "beach.jpg-1" is.
pub fn is_copy_name(filename: &str) -> bool {
    let name = filename.to_lowercase();
    name.contains("copy") || PAREN_NUMBER.is_match(&name) || TRAILING_DASH_NUMBER.is_match(&name)
}

/// Outcome of observing one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// First asset with this fingerprint.
    Kept,
    /// Same content as `kept`, which stays. Move the current asset away.
    Duplicate { kept: String },
    /// The current asset replaces `replaced`, which must be moved away.
    Supersedes { replaced: String },
}

/// Fingerprint -> filename of the single kept asset.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    kept: HashMap<Fingerprint, String>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kept(&self, fingerprint: &Fingerprint) -> Option<&str> {
        self.kept.get(fingerprint).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct DuplicateResolver {
    index: FingerprintIndex,
}

impl DuplicateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> &FingerprintIndex {
        &self.index
    }

    /// Record `filename` under `fingerprint` and decide what happens to it.
    ///
    /// When both or neither name looks like a copy, the asset seen first wins.
    pub fn observe(&mut self, filename: &str, fingerprint: Fingerprint) -> Verdict {
        match self.index.kept.entry(fingerprint) {
            Entry::Vacant(slot) => {
                slot.insert(filename.to_string());
                Verdict::Kept
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if !is_copy_name(filename) && is_copy_name(existing) {
                    let replaced = std::mem::replace(existing, filename.to_string());
                    Verdict::Supersedes { replaced }
                } else {
                    Verdict::Duplicate {
                        kept: existing.clone(),
                    }
                }
            }
        }
    }

    /// Undo a promotion whose move could not be applied, so the index keeps
    /// pointing at the asset that is still in place.
    pub fn revert(&mut self, fingerprint: &Fingerprint, restored: &str) {
        if let Some(kept) = self.index.kept.get_mut(fingerprint) {
            *kept = restored.to_string();
        }
    }
}
