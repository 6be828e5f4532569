//! LLM Output Validation
//!
//! JSON extraction and repair for structured provider responses.

mod json_repair;

pub use json_repair::parse_structured;
