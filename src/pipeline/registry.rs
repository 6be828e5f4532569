//! Stage Registry
//!
//! Deterministic construction of the stage set from the shared
//! collaborators. The engine addresses stages by slot; `all()` gives the
//! ordered view.

use std::sync::Arc;

use crate::pipeline::PipelineDeps;
use crate::pipeline::stage::Stage;
use crate::pipeline::stages::{
    CitationsStage, FetchStage, GenerationStage, ImageStage, InternalLinksStage, MergeLinkStage,
    MetadataStage, PromptStage, QualityGateStage, QualityRefinementStage, StorageExportStage,
    TocStage,
};

pub struct StageRegistry {
    pub fetch: Arc<dyn Stage>,
    pub prompt: Arc<dyn Stage>,
    pub generation: Arc<dyn Stage>,
    pub refinement: Arc<dyn Stage>,
    pub citations: Arc<dyn Stage>,
    pub internal_links: Arc<dyn Stage>,
    pub toc: Arc<dyn Stage>,
    pub metadata: Arc<dyn Stage>,
    pub images: Arc<dyn Stage>,
    pub merge: Arc<dyn Stage>,
    pub quality_gate: Arc<dyn Stage>,
    pub export: Arc<dyn Stage>,
}

impl StageRegistry {
    pub fn new(deps: &PipelineDeps) -> Self {
        let pipeline = &deps.config.pipeline;
        Self {
            fetch: Arc::new(FetchStage::new(deps.resolver.clone())),
            prompt: Arc::new(PromptStage::new()),
            generation: Arc::new(GenerationStage::new(
                deps.provider.clone(),
                deps.timeouts.clone(),
            )),
            refinement: Arc::new(QualityRefinementStage::new(
                deps.provider.clone(),
                deps.timeouts.clone(),
            )),
            citations: Arc::new(CitationsStage::new(
                deps.prober.clone(),
                deps.config.citations.clone(),
                deps.config.network.probe_concurrency,
            )),
            internal_links: Arc::new(InternalLinksStage::new(
                deps.prober.clone(),
                deps.config.network.probe_concurrency,
            )),
            toc: Arc::new(TocStage::new()),
            metadata: Arc::new(MetadataStage::new(
                pipeline.randomize_publication_date,
                pipeline.freshness_window_days,
            )),
            images: Arc::new(ImageStage::new(
                deps.image_generator.clone(),
                deps.config.export.output_dir.clone(),
            )),
            merge: Arc::new(MergeLinkStage::new()),
            quality_gate: Arc::new(QualityGateStage::new(pipeline.freshness_window_days)),
            export: Arc::new(StorageExportStage::new(
                deps.config.export.output_dir.clone(),
            )),
        }
    }

    /// Stages in execution order
    pub fn all(&self) -> Vec<Arc<dyn Stage>> {
        vec![
            self.fetch.clone(),
            self.prompt.clone(),
            self.generation.clone(),
            self.refinement.clone(),
            self.citations.clone(),
            self.internal_links.clone(),
            self.toc.clone(),
            self.metadata.clone(),
            self.images.clone(),
            self.merge.clone(),
            self.quality_gate.clone(),
            self.export.clone(),
        ]
    }
}
