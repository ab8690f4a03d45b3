//! nvidia-docker-compose
//!
//! Runs docker-compose with the host's GPU devices and driver volumes
//! injected into every service of the compose file.

mod commands;

use clap::Parser;
use nvcompose_core::{ComposeError, LoggingConfig, WrapperConfig, EXIT_FAILURE};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// nvidia-docker-compose - GPU enabled docker-compose wrapper
///
/// Any argument not listed here is passed to docker-compose unchanged.
#[derive(Parser, Debug)]
#[command(name = "nvidia-docker-compose")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base compose file (defaults to docker-compose.yml)
    #[arg(short, long, value_name = "INPUT_FILE")]
    file: Option<PathBuf>,

    /// Compose template rendered with N_GPU and GPU_DEVICES before merging
    #[arg(short, long, value_name = "TEMPLATE_FILE", conflicts_with = "file")]
    template: Option<PathBuf>,

    /// Keep the merged compose file at this path
    #[arg(short, long, value_name = "OUTPUT_FILE")]
    output: Option<PathBuf>,

    /// Only generate the merged compose file, do not run docker-compose
    #[arg(short = 'G', long)]
    generate: bool,

    /// Wrapper configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Arguments forwarded to docker-compose
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMPOSE_ARGS")]
    compose_args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match WrapperConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("nvidia-docker-compose: {}", e);
            return ExitCode::from(EXIT_FAILURE as u8);
        }
    };

    init_logging(cli.verbose, &config.logging);

    let invocation = commands::invocation(
        cli.file,
        cli.template,
        cli.output,
        cli.generate,
        cli.compose_args,
        &config,
    );

    match commands::run(invocation, &config).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(EXIT_FAILURE as u8)),
        Err(e) => {
            error!(error = %e, "Invocation failed");
            eprintln!("nvidia-docker-compose: {:#}", e);
            let code = e
                .downcast_ref::<ComposeError>()
                .map(ComposeError::exit_code)
                .unwrap_or(EXIT_FAILURE);
            ExitCode::from(code as u8)
        }
    }
}

/// Initialize logging on stderr, leaving stdout to docker-compose
fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let default_level = if verbose {
        "debug"
    } else {
        logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if logging.format == "compact" {
        tracing::subscriber::set_global_default(builder.compact().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    // Logging is diagnostics only; compose still runs without it
    if let Err(e) = result {
        eprintln!("nvidia-docker-compose: failed to initialize logging: {}", e);
    }
}
