use clap::Parser;
use zipsync_server::ServerBuilder;
use zipsync_server::config::loader::load_config;

/// Reconciles CSV uploads against keyed document collections.
#[derive(Debug, Parser)]
#[command(name = "zipsync-server", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "ZIPSYNC_CONFIG", default_value = "zipsync.toml")]
    config: String,
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    zipsync_server::observability::init_tracing();

    let args = Args::parse();

    let cfg = match load_config(Some(&args.config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(path = %args.config, backend = ?cfg.storage.backend, "Configuration loaded");
    zipsync_server::observability::apply_logging_level(&cfg.logging.level);

    let server = match ServerBuilder::new().with_config(cfg).build().await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e}");
            std::process::exit(2);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
