//! Image Stage
//!
//! Generates hero/mid/bottom imagery, bounded at one concurrent call per
//! placement. Every failure degrades to a text-only article; nothing here
//! can fail the job.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::ai::image::ImageGenerator;
use crate::constants::concurrency;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::results::ImageResult;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::types::{ForgeError, Result};

/// Placement name, aspect ratio, and prompt flavor
const PLACEMENTS: [(&str, &str, &str); 3] = [
    ("hero", "16:9", "wide editorial hero illustration"),
    ("mid", "4:3", "supporting in-article illustration"),
    ("bottom", "16:9", "closing summary illustration"),
];

pub struct ImageStage {
    generator: Option<Arc<dyn ImageGenerator>>,
    output_dir: PathBuf,
}

impl ImageStage {
    pub fn new(generator: Option<Arc<dyn ImageGenerator>>, output_dir: PathBuf) -> Self {
        Self {
            generator,
            output_dir,
        }
    }
}

#[async_trait]
impl Stage for ImageStage {
    fn number(&self) -> u8 {
        8
    }

    fn name(&self) -> &'static str {
        "images"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let mut warnings = Vec::new();

        if !ctx.job_config.enable_images {
            return Ok(StageReport::new(StageOutput::Images(ImageResult::default())));
        }
        let Some(generator) = &self.generator else {
            warnings.push("image generator not configured; skipping images".to_string());
            return Ok(StageReport::with_warnings(
                StageOutput::Images(ImageResult::default()),
                warnings,
            ));
        };
        let article = ctx
            .structured_data
            .as_ref()
            .ok_or_else(|| ForgeError::stage(8, "images", "no structured data"))?;

        let image_dir = self.output_dir.join(&ctx.job_id).join("images");
        if let Err(e) = std::fs::create_dir_all(&image_dir) {
            warnings.push(format!("cannot create image directory: {}", e));
            return Ok(StageReport::with_warnings(
                StageOutput::Images(ImageResult::default()),
                warnings,
            ));
        }

        let headline = article.headline.clone();
        let keyword = ctx.job_config.primary_keyword.clone();

        let placement_futures: Vec<_> = PLACEMENTS
            .into_iter()
            .map(|entry: (&'static str, &'static str, &'static str)| {
                let placement = entry.0.to_string();
                let aspect = entry.1.to_string();
                let flavor = entry.2.to_string();
                let generator = Arc::clone(generator);
                let headline = headline.clone();
                let keyword = keyword.clone();
                let image_dir = image_dir.clone();
                async move {
                    let prompt = format!(
                        "{flavor} for a professional blog article titled \"{headline}\" \
                         about {keyword}. No text in the image."
                    );
                    let result = match generator.generate_image(&prompt, &aspect).await {
                        Ok(image) => {
                            let filename = format!("{}.{}", placement, image.extension());
                            let path = image_dir.join(&filename);
                            match std::fs::write(&path, &image.bytes) {
                                Ok(()) => Ok(format!("images/{}", filename)),
                                Err(e) => Err(format!("write failed: {}", e)),
                            }
                        }
                        Err(e) => Err(e.to_string()),
                    };
                    (placement, result)
                }
            })
            .collect();

        let generated: Vec<(String, std::result::Result<String, String>)> =
            futures::stream::iter(placement_futures)
            .buffer_unordered(concurrency::IMAGE_CONCURRENCY)
            .collect()
            .await;

        let mut images = BTreeMap::new();
        for (placement, result) in generated {
            match result {
                Ok(uri) => {
                    images.insert(placement, uri);
                }
                Err(reason) => {
                    warn!(placement = %placement, "Image generation failed: {}", reason);
                    warnings.push(format!("{} image failed: {}", placement, reason));
                }
            }
        }

        info!(images = images.len(), "Image stage complete");
        Ok(StageReport::with_warnings(
            StageOutput::Images(ImageResult { images }),
            warnings,
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
