//! Pipeline Stages
//!
//! The fixed 14-stage topology: sequential prefix (0-2), conditional
//! refinement (3), parallel fan-out (4-7 + images), then merge, gate, and
//! export.

pub mod citations;
pub mod export;
pub mod fetch;
pub mod generation;
pub mod images;
pub mod internal_links;
pub mod merge;
pub mod metadata;
pub mod prompt;
pub mod quality_gate;
pub mod refinement;
pub mod toc;

pub use citations::CitationsStage;
pub use export::StorageExportStage;
pub use fetch::FetchStage;
pub use generation::GenerationStage;
pub use images::ImageStage;
pub use internal_links::InternalLinksStage;
pub use merge::MergeLinkStage;
pub use metadata::MetadataStage;
pub use prompt::PromptStage;
pub use quality_gate::QualityGateStage;
pub use refinement::QualityRefinementStage;
pub use toc::TocStage;
