use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// A3S Canary — model serving router with canary rollout
#[derive(Parser)]
#[command(name = "a3s-canary", version, about)]
struct Cli {
    /// Path to configuration file (.hcl)
    #[arg(short, long, default_value = "canary.hcl")]
    config: String,

    /// Override listen address (e.g., 0.0.0.0:8000)
    #[arg(short, long)]
    listen: Option<String>,

    /// Override model registry URL
    #[arg(long, env = "CANARY_REGISTRY_URL")]
    registry: Option<String>,

    /// Override registered model name
    #[arg(long, env = "CANARY_MODEL")]
    model: Option<String>,

    /// Override the fraction of traffic sent to the current model
    #[arg(short, long)]
    probability: Option<f64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file without starting the server
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long, default_value = "canary.hcl")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> a3s_canary::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Validate { config: config_path }) = &cli.command {
        return validate_config(config_path).await;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    tracing::info!("A3S Canary v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if std::path::Path::new(&cli.config).exists() {
        tracing::info!(config = cli.config, "Loading configuration");
        a3s_canary::config::ServeConfig::from_file(&cli.config).await?
    } else {
        tracing::warn!("Config file not found, using defaults");
        a3s_canary::config::ServeConfig::default()
    };

    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(registry) = cli.registry {
        config.registry.url = registry;
    }
    if let Some(model) = cli.model {
        config.registry.model = model;
    }
    if let Some(p) = cli.probability {
        config.routing.current_probability = p;
    }

    let server = a3s_canary::CanaryServer::from_config(config)?;
    server.start().await?;

    tracing::info!("Canary server ready, press Ctrl+C to stop");

    server.wait_for_shutdown().await;

    Ok(())
}

/// Validate a configuration file and print diagnostics
async fn validate_config(path: &str) -> a3s_canary::Result<()> {
    use std::path::Path;

    if !Path::new(path).exists() {
        eprintln!("✗ Config file not found: {}", path);
        std::process::exit(1);
    }

    let config = match a3s_canary::config::ServeConfig::from_file(path).await {
        Ok(c) => {
            println!("✓ Config parsed successfully ({})", path);
            c
        }
        Err(e) => {
            eprintln!("✗ Parse error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("✗ Validation error: {}", e);
        std::process::exit(1);
    }

    println!("✓ Configuration is valid");
    println!();
    println!("  Listen:      {}", config.listen);
    println!("  Registry:    {} (model: {})", config.registry.url, config.registry.model);
    println!(
        "  Routing:     {:.0}% current / {:.0}% candidate",
        config.routing.current_probability * 100.0,
        (1.0 - config.routing.current_probability) * 100.0
    );
    match config.predict_timeout() {
        Some(t) => println!("  Timeout:     {} ms", t.as_millis()),
        None => println!("  Timeout:     disabled"),
    }

    Ok(())
}
