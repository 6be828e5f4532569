//! CLI Commands
//!
//! Wires the configured collaborators into the pipeline and renders run
//! summaries for the terminal.

use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use crate::ai::image::GeminiImageGenerator;
use crate::ai::provider::create_provider;
use crate::ai::timeout::TimeoutConfig;
use crate::config::{Config, ConfigLoader, ExportFormat, JobConfig};
use crate::net::{HttpProber, SitemapResolver};
use crate::pipeline::{ExecutionContext, PipelineDeps, RegenerationController, WorkflowEngine};
use crate::types::Result;

/// Per-invocation overrides collected from CLI flags
#[derive(Debug, Default)]
pub struct GenerateOptions {
    pub keyword: String,
    pub company_url: String,
    pub market: Option<String>,
    pub language: Option<String>,
    pub tone: Option<String>,
    pub word_count: Option<usize>,
    pub formats: Vec<String>,
    pub max_regenerations: Option<u32>,
    pub no_images: bool,
    pub custom_instructions: Option<String>,
    pub competitors: Vec<String>,
    pub output: Option<PathBuf>,
}

/// Run a full article generation job
pub async fn run_generate(mut config: Config, options: GenerateOptions) -> Result<ExecutionContext> {
    if let Some(output) = &options.output {
        config.export.output_dir = output.clone();
    }

    let mut job = JobConfig::new(&config, &options.keyword, &options.company_url);
    job.market = options.market;
    job.language = options.language;
    job.tone_override = options.tone;
    job.custom_instructions = options.custom_instructions;
    if let Some(word_count) = options.word_count {
        job.word_count_target = word_count;
    }
    if let Some(max) = options.max_regenerations {
        job.max_regenerations = max;
    }
    if options.no_images {
        job.enable_images = false;
    }
    if !options.formats.is_empty() {
        job.export_formats = options
            .formats
            .iter()
            .map(|f| f.parse::<ExportFormat>())
            .collect::<Result<Vec<_>>>()?;
    }
    if !options.competitors.is_empty() {
        job.competitors = options.competitors.clone();
    }

    let provider = create_provider(&config.llm)?;
    let image_generator = if job.enable_images {
        match GeminiImageGenerator::new(&config.llm) {
            Ok(generator) => Some(Arc::new(generator) as Arc<dyn crate::ai::image::ImageGenerator>),
            Err(e) => {
                tracing::warn!("Image generator unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let deps = PipelineDeps {
        provider: provider.clone(),
        prober: Arc::new(HttpProber::new(config.network.probe_timeout_secs)?),
        resolver: Arc::new(SitemapResolver::new(Some(provider))?),
        image_generator,
        config,
        timeouts: TimeoutConfig::default(),
    };

    let controller = RegenerationController::new(WorkflowEngine::new(&deps));
    controller.run(job).await
}

/// Render the run summary for the terminal
pub fn print_summary(ctx: &ExecutionContext) {
    let state = match ctx.state {
        crate::pipeline::RunState::Done => style(ctx.state.to_string()).green().bold(),
        crate::pipeline::RunState::Degraded => style(ctx.state.to_string()).yellow().bold(),
        _ => style(ctx.state.to_string()).red().bold(),
    };
    println!("\n{} {}", style("Run:").bold(), state);

    if let Some(report) = &ctx.quality_report {
        println!("{} {}", style("Quality:").bold(), report.summary());
        for issue in &report.critical_issues {
            println!("  {} {}", style("✗").red(), issue);
        }
    }

    if !ctx.storage_result.is_empty() {
        println!("{}", style("Exports:").bold());
        for (format, path) in &ctx.storage_result {
            println!("  {} {}", style(format).cyan(), path.display());
        }
    }

    let total: f64 = ctx.execution_times.values().sum();
    println!("{} {:.1}s total", style("Timing:").bold(), total);
    for (stage, seconds) in &ctx.execution_times {
        println!("  {:<20} {:.2}s", stage, seconds);
    }

    if !ctx.warnings.is_empty() {
        println!(
            "{} {} warning(s)",
            style("Warnings:").bold(),
            ctx.warnings.len()
        );
    }
    for error in &ctx.errors {
        println!("  {} {}", style("error:").red(), error);
    }
}

/// Print the effective configuration
pub fn run_config_show(config: &Config) -> Result<()> {
    println!("{}", ConfigLoader::render(config)?);
    if let Some(path) = ConfigLoader::global_config_path() {
        println!("# global config: {}", path.display());
    }
    println!(
        "# project config: {}",
        ConfigLoader::project_config_path().display()
    );
    Ok(())
}
