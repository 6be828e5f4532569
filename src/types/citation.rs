//! Citation Types
//!
//! The citation map is created by the citations stage, consumed read-only by
//! the merge stage and the exporters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resolved citation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    /// Short description taken from the source line (used as link text)
    pub title: String,
    /// "source" for probed originals, "authority" for fallback substitutions
    pub kind: String,
}

/// Mapping from numeric citation marker to resolved citation.
///
/// BTreeMap keeps the Sources section ordered by marker number.
pub type CitationMap = BTreeMap<u32, Citation>;
