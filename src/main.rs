use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use blogforge::cli::{GenerateOptions, print_summary, run_config_show, run_generate};
use blogforge::config::ConfigLoader;
use blogforge::pipeline::RunState;

#[derive(Parser)]
#[command(name = "blogforge")]
#[command(version, about = "AI-driven SEO/AEO blog article generation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, help = "Debug-level logging")]
    verbose: bool,

    #[arg(long, short, help = "Errors only")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an article from a primary keyword and company URL
    Generate {
        #[arg(long, short, env = "BLOGFORGE_KEYWORD", help = "Primary keyword")]
        keyword: String,

        #[arg(long, env = "BLOGFORGE_COMPANY_URL", help = "Company URL")]
        company_url: String,

        #[arg(long, help = "Target market")]
        market: Option<String>,

        #[arg(long, help = "Article language")]
        language: Option<String>,

        #[arg(long, help = "Tone override")]
        tone: Option<String>,

        #[arg(long, help = "Word-count target")]
        word_count: Option<usize>,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Export formats (html, markdown, json, csv, xlsx, pdf)"
        )]
        formats: Vec<String>,

        #[arg(long, help = "Maximum regenerations after a failed quality gate")]
        max_regenerations: Option<u32>,

        #[arg(long, help = "Skip image generation")]
        no_images: bool,

        #[arg(long, help = "Free-text instructions inserted into the prompt")]
        custom_instructions: Option<String>,

        #[arg(long, value_delimiter = ',', help = "Competitor domains to suppress")]
        competitors: Vec<String>,

        #[arg(long, short, help = "Output directory")]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config,
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("blogforge={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(1);
        }
    };

    match cli.command {
        Commands::Generate {
            keyword,
            company_url,
            market,
            language,
            tone,
            word_count,
            formats,
            max_regenerations,
            no_images,
            custom_instructions,
            competitors,
            output,
        } => {
            let options = GenerateOptions {
                keyword,
                company_url,
                market,
                language,
                tone,
                word_count,
                formats,
                max_regenerations,
                no_images,
                custom_instructions,
                competitors,
                output,
            };

            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("Failed to start runtime: {}", e);
                    return ExitCode::from(1);
                }
            };

            match runtime.block_on(run_generate(config, options)) {
                Ok(ctx) => {
                    print_summary(&ctx);
                    match ctx.state {
                        RunState::Done => ExitCode::SUCCESS,
                        RunState::Degraded => ExitCode::from(2),
                        _ => ExitCode::from(1),
                    }
                }
                Err(e) => {
                    eprintln!("Run failed: {}", e);
                    ExitCode::from(1)
                }
            }
        }
        Commands::Config => match run_config_show(&config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::from(1)
            }
        },
    }
}
