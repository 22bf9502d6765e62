use clap::{Parser, Subcommand};
use log_error_analyzer::{extract_errors, Analyzer, Config, GeminiClient, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Extract and explain ERROR lines in log files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the error messages found in a log file as JSON
    Extract {
        /// Log file to scan
        file: PathBuf,
    },
    /// Extract error messages and explain each one with the Gemini API
    Analyze {
        /// Log file to scan
        file: PathBuf,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract { file } => {
            let errors = extract_from(&file).await?;
            println!("{}", serde_json::to_string_pretty(&errors)?);
        }
        Command::Analyze { file, config } => {
            let config = Config::load(config.as_deref())?;
            config.validate()?;

            let errors = extract_from(&file).await?;
            let model = Arc::new(GeminiClient::new(&config.gemini)?);
            let analyzer = Analyzer::new(model, config.schema_mode());

            let results = analyzer.analyze_all(&errors).await;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

async fn extract_from(file: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(file).await?;
    Ok(extract_errors(&content))
}
