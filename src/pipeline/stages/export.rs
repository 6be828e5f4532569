//! Stage 9 - Storage / Export
//!
//! Writes the requested export formats into the per-job directory, plus a
//! metadata.json carrying the quality report, timings, and warnings. Runs
//! after the quality gate so every export reflects the gated artifact.
//! Per-format failures are recorded, never fatal.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::export::FileExporter;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::types::Result;

pub struct StorageExportStage {
    exporter: FileExporter,
    output_dir: PathBuf,
}

impl StorageExportStage {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            exporter: FileExporter::new(),
            output_dir,
        }
    }
}

#[async_trait]
impl Stage for StorageExportStage {
    fn number(&self) -> u8 {
        9
    }

    fn name(&self) -> &'static str {
        "storage_export"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let mut warnings = Vec::new();
        let dir = self.output_dir.join(&ctx.job_id);
        std::fs::create_dir_all(&dir)?;

        let mut paths: BTreeMap<String, PathBuf> = BTreeMap::new();

        match &ctx.validated_article {
            Some(article) => {
                let (exported, failures) =
                    self.exporter
                        .export_all(article, &ctx.job_config.export_formats, &dir);
                paths.extend(exported);
                warnings.extend(failures);
            }
            None => {
                warnings.push("no validated article; exporting run metadata only".to_string());
            }
        }

        // Run metadata always gets written, even for failed runs
        let metadata = json!({
            "job_id": ctx.job_id,
            "primary_keyword": ctx.job_config.primary_keyword,
            "company_url": ctx.job_config.company_url,
            "state": ctx.state,
            "regeneration_attempts": ctx.regeneration_attempts,
            "quality_report": ctx.quality_report,
            "execution_times": ctx.execution_times,
            "warnings": ctx.warnings,
            "errors": ctx.errors,
        });
        let metadata_path = dir.join("metadata.json");
        std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;
        paths.insert("metadata".to_string(), metadata_path);

        info!(files = paths.len(), dir = %dir.display(), "Export complete");
        Ok(StageReport::with_warnings(StageOutput::Storage(paths), warnings))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportFormat;
    use crate::testing::sample_job;
    use serde_json::{Map, Value};

    fn ctx_with_article(formats: Vec<ExportFormat>) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(sample_job());
        ctx.job_config.export_formats = formats;
        let mut article = Map::new();
        article.insert("Headline".into(), Value::String("H".into()));
        article.insert("Intro".into(), Value::String("<p>i</p>".into()));
        article.insert("section_01_title".into(), Value::String("T".into()));
        article.insert("section_01_content".into(), Value::String("<p>c</p>".into()));
        ctx.validated_article = Some(article);
        ctx
    }

    #[tokio::test]
    async fn test_exports_requested_formats() {
        let dir = tempfile::tempdir().unwrap();
        let stage = StorageExportStage::new(dir.path().to_path_buf());
        let ctx = ctx_with_article(vec![ExportFormat::Html, ExportFormat::Json]);
        let report = stage.execute(&ctx).await.unwrap();
        let StageOutput::Storage(paths) = report.output else {
            panic!("expected storage output");
        };
        assert!(paths["html"].ends_with("index.html"));
        assert!(paths["json"].ends_with("article.json"));
        assert!(paths["metadata"].exists());
        assert!(paths["html"].exists());
    }

    #[tokio::test]
    async fn test_unsupported_format_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let stage = StorageExportStage::new(dir.path().to_path_buf());
        let ctx = ctx_with_article(vec![ExportFormat::Json, ExportFormat::Pdf]);
        let report = stage.execute(&ctx).await.unwrap();
        let StageOutput::Storage(paths) = report.output else {
            panic!("expected storage output");
        };
        // pdf failed but json still exported
        assert!(paths.contains_key("json"));
        assert!(!paths.contains_key("pdf"));
        assert!(report.warnings.iter().any(|w| w.contains("pdf")));
    }

    #[tokio::test]
    async fn test_failed_run_still_writes_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let stage = StorageExportStage::new(dir.path().to_path_buf());
        let mut ctx = ExecutionContext::new(sample_job());
        ctx.error("generation failed");
        let report = stage.execute(&ctx).await.unwrap();
        let StageOutput::Storage(paths) = report.output else {
            panic!("expected storage output");
        };
        assert!(paths["metadata"].exists());
        let metadata: Value =
            serde_json::from_str(&std::fs::read_to_string(&paths["metadata"]).unwrap()).unwrap();
        assert_eq!(metadata["errors"][0], "generation failed");
    }
}
