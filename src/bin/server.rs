use clap::Parser;
use log_error_analyzer::{
    api::{create_app, AppState},
    logging, Analyzer, Config, GeminiClient,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Web server for uploading logs and analyzing their errors
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the configuration
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Create configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    config.validate()?;
    config.ensure_directories_exist().await?;

    // Initialize logging
    logging::init(&config)?;

    let model = Arc::new(GeminiClient::new(&config.gemini)?);
    let analyzer = Analyzer::new(model, config.schema_mode());

    info!("Log Error Analyzer starting...");
    info!("Upload directory: {}", config.upload_dir.display());
    info!("Log directory: {}", config.log_dir.display());
    info!("Allowed origins: {}", config.server.allowed_origins.join(", "));

    let bind_addr = config.server.bind_addr.clone();
    let app = create_app(AppState::new(config, analyzer))?;

    // Start the server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
