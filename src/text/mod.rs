//! Pure Text Primitives
//!
//! The three clean primitives the pipeline builds on instead of ad-hoc
//! cleanup layers: tag-aware entity encoding, dash removal, and citation
//! linkification. Everything here is I/O-free and idempotent.

pub mod linker;
pub mod normalizer;

pub use linker::{linkify, markers_outside_anchors, unresolved_markers};
pub use normalizer::{
    check_tag_balance, contains_dashes, contains_html, encode_entities, slugify, strip_dashes,
    strip_html, word_count,
};
