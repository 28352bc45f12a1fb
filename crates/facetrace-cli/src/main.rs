use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facetrace_core::{
    same_person, Anonymizer, CommandAnalyzer, FaceAnalyzer, FaceLocator, UnavailableAnalyzer,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "facetrace", about = "Face analysis, anonymization and comparison")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect, encode and describe every face in an image
    Analyze {
        /// Image to analyze
        image: PathBuf,
    },
    /// Blur every face in an image
    Anonymize {
        input: PathBuf,
        output: PathBuf,
    },
    /// Decide whether two encodings (JSON float arrays) are the same person
    Compare {
        first: PathBuf,
        second: PathBuf,
        /// Match threshold (defaults to the configured value)
        #[arg(short, long)]
        threshold: Option<f32>,
    },
}

fn load_locator(config: &Config) -> Result<FaceLocator> {
    let locator = FaceLocator::load(&config.ssd_model_path(), &config.cascade_model_path())
        .context("no face detector could be loaded")?;
    tracing::info!(
        strategy = locator.strategy_name(),
        fallback = ?locator.fallback_reason(),
        "face locator ready"
    );
    Ok(locator)
}

fn read_encoding(path: &Path) -> Result<Vec<f32>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON float array", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { image } => {
            let locator = load_locator(&config)?;
            let result = match CommandAnalyzer::from_command_line(&config.attribute_command) {
                Some(attributes) => FaceAnalyzer::new(locator, attributes).analyze(&image).await,
                None => {
                    tracing::warn!("no attribute command configured; faces will lack demographics");
                    FaceAnalyzer::new(locator, UnavailableAnalyzer).analyze(&image).await
                }
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Anonymize { input, output } => {
            let mut anonymizer = Anonymizer::new(load_locator(&config)?);
            let success = anonymizer.redact(&input, &output);
            println!("{}", serde_json::json!({ "success": success }));
            if !success {
                std::process::exit(1);
            }
        }
        Commands::Compare {
            first,
            second,
            threshold,
        } => {
            let a = read_encoding(&first)?;
            let b = read_encoding(&second)?;
            let threshold = threshold.unwrap_or(config.match_threshold);
            println!(
                "{}",
                serde_json::json!({ "same_person": same_person(&a, &b, threshold) })
            );
        }
    }

    Ok(())
}
